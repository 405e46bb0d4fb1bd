use crate::error::DecodeError;
use crate::parser::registry::ProtocolDecoder;
use crate::protocols::{ANCHOR_EVENT_TAG, Protocol, ProtocolAction, discriminator};
use crate::records::TransferEvent;
use crate::transaction::{BalanceIndex, CanonicalInstruction};

/// Aggregator entry points. Each hop is a CPI into an AMM whose own decoder
/// reports it; the route itself adds nothing until hops are collapsed.
const ROUTES: [[u8; 8]; 6] = [
    [229, 23, 203, 151, 122, 227, 173, 42],  // route
    [193, 32, 155, 51, 65, 214, 156, 129],   // shared_accounts_route
    [208, 51, 239, 151, 123, 43, 237, 92],   // exact_out_route
    [176, 209, 105, 168, 154, 125, 69, 62],  // shared_accounts_exact_out_route
    [150, 86, 71, 116, 167, 93, 14, 104],    // route_with_token_ledger
    [230, 121, 143, 80, 119, 159, 106, 170], // shared_accounts_route_with_token_ledger
];

const HOUSEKEEPING: [[u8; 8]; 6] = [
    [228, 85, 185, 112, 78, 79, 77, 2],      // set_token_ledger
    [232, 242, 197, 253, 240, 143, 129, 52], // create_token_ledger
    [62, 198, 214, 193, 213, 159, 108, 210], // claim
    [178, 162, 200, 27, 26, 157, 168, 212],  // claim_token_ledger
    [229, 194, 212, 172, 8, 10, 134, 147],   // create_open_orders
    ANCHOR_EVENT_TAG,
];

#[derive(Debug)]
pub struct JupiterDecoder;

impl ProtocolDecoder for JupiterDecoder {
    fn name(&self) -> &str {
        Protocol::Jupiter.as_ref()
    }

    fn decode(
        &self,
        ix: &CanonicalInstruction,
        _transfers: &[TransferEvent],
        _balances: &BalanceIndex,
    ) -> Result<Vec<ProtocolAction>, DecodeError> {
        match discriminator(&ix.data) {
            Some(d) if ROUTES.contains(&d) || HOUSEKEEPING.contains(&d) => Ok(Vec::new()),
            _ => Err(DecodeError::unrecognized_layout()),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;
    use crate::protocols::JUPITER_V6_PROGRAM_ID;
    use crate::protocols::test_support::{instruction_with, named_accounts};

    #[test]
    fn routes_and_housekeeping_decode_to_nothing() {
        for disc in ROUTES.iter().chain(HOUSEKEEPING.iter()) {
            let mut data = disc.to_vec();
            data.extend_from_slice(&[0; 16]);
            let ix = instruction_with(JUPITER_V6_PROGRAM_ID, &named_accounts(4), data);
            assert!(
                JupiterDecoder
                    .decode(&ix, &[], &BalanceIndex::default())
                    .unwrap()
                    .is_empty()
            );
        }
    }

    #[test]
    fn unknown_or_short_data_is_rejected() {
        for data in [vec![1, 2, 3], vec![9; 8]] {
            let ix = instruction_with(JUPITER_V6_PROGRAM_ID, &named_accounts(1), data);
            assert_eq!(
                JupiterDecoder
                    .decode(&ix, &[], &BalanceIndex::default())
                    .unwrap_err(),
                DecodeError::unrecognized_layout()
            );
        }
    }
}
