//! Multi-hop collapsing.
//!
//! Consecutive swap legs of the same user that chain by mint (each output
//! mint is the next input mint) form a route. Every route gains one
//! synthesized trade carrying the first input and the last output; the legs
//! themselves stay in the list unchanged.

use crate::parser::normalize::classify;
use crate::protocols::Protocol;
use crate::records::Trade;
use crate::transaction::InstructionTree;

fn chains(prev: &Trade, next: &Trade) -> bool {
    prev.route.is_none()
        && next.route.is_none()
        && prev.signature == next.signature
        && prev.user == next.user
        && prev.output_token.mint == next.input_token.mint
}

pub fn collapse_routes(trades: Vec<Trade>, tree: &InstructionTree) -> Vec<Trade> {
    let mut out = Vec::with_capacity(trades.len());
    let mut next_route = 0;
    let mut start = 0;

    while start < trades.len() {
        let mut end = start + 1;
        while end < trades.len() && chains(&trades[end - 1], &trades[end]) {
            end += 1;
        }

        let hops = &trades[start..end];
        out.extend_from_slice(hops);
        if hops.len() > 1 {
            out.push(synthesize(hops, next_route, tree));
            tracing::debug!(route = next_route, hops = hops.len(), "collapsed multi-hop route");
            next_route += 1;
        }
        start = end;
    }

    out
}

/// Outer-facing trade of a route, attributed to the top-level instruction
/// (the router) that issued the first hop.
fn synthesize(hops: &[Trade], route: usize, tree: &InstructionTree) -> Trade {
    let first = &hops[0];
    let last = &hops[hops.len() - 1];

    let root = tree.root_of(first.position);
    let (program_id, position) = root.map_or_else(
        || (first.program_id.clone(), first.position),
        |r| (r.program_id.clone(), r.position),
    );
    let amm = Protocol::from_program_id(&program_id)
        .map_or_else(|| first.amm.clone(), |p| p.to_string());

    Trade {
        signature: first.signature.clone(),
        slot: first.slot,
        timestamp: first.timestamp,
        trade_type: classify(&first.input_token.mint, &last.output_token.mint),
        user: first.user.clone(),
        input_token: first.input_token.clone(),
        output_token: last.output_token.clone(),
        amm,
        program_id,
        pool_id: first.pool_id.clone(),
        position,
        route: Some(route),
        fee: None,
    }
}
