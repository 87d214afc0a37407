use base58::ToBase58;
use uuid::Uuid;

use crate::prelude::*;

/// ID Generator. The default format is a base58-rendered UUID v4; holder and
/// session identities minted by clients use this scheme. Overriding the
/// scheme is possible but should only be done after careful consideration.
pub struct IdGenerator;

impl IdGenerator {
    pub fn generate() -> InlineStr {
        Uuid::new_v4().as_bytes().to_base58().into()
    }
}
