/// Who is acting on a request, taken from the optional `x-actor` header.
///
/// Recorded as `created_by` on ledger entries; absent means anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    actor: Option<String>,
}

impl ActorContext {
    pub fn new(actor: Option<String>) -> Self {
        Self {
            actor: actor.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
        }
    }

    pub fn actor(&self) -> Option<String> {
        self.actor.clone()
    }
}
