//! Client number backfill
//!
//! Clients created before numbering existed (or imported without one) get the
//! next free numbers in iteration order. Running it again is a no-op.

use tracing::{info, warn};

use crate::model::Client;
use crate::numbering::next_client_number;

/// Assign numbers to every client missing one. Returns how many changed.
pub fn assign_missing_client_numbers(clients: &mut [Client]) -> usize {
    let mut next = Some(next_client_number(clients));
    let mut assigned = 0;

    for client in clients.iter_mut().filter(|c| c.client_number.is_none()) {
        let Some(number) = next else {
            warn!(client = %client.id, "no client numbers left to assign");
            break;
        };
        client.client_number = Some(number);
        next = number.checked_add(1);
        assigned += 1;
    }

    if assigned > 0 {
        info!(assigned, "assigned missing client numbers");
    }
    assigned
}
