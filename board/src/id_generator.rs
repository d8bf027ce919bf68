use crate::board::TokenId;

/// Hands out token identities for a single board. Ids are never reused, even
/// across `configure` resets, so a stale token can never alias a live one.
#[derive(Debug, Default)]
pub struct TokenIdGenerator {
    next: u64,
}

impl TokenIdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn generate(&mut self) -> TokenId {
        let id = TokenId::new(self.next.max(1));
        self.next = id.value() + 1;
        id
    }

    /// Whether `id` was handed out by this generator.
    pub fn was_issued(&self, id: TokenId) -> bool {
        id.value() >= 1 && id.value() < self.next.max(1)
    }
}
