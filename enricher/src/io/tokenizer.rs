//! Token counting backed by tiktoken encodings.
//!
//! The consuming model's tokenizer is not public; these BPE encodings are
//! approximations, good enough for budget accounting. When an encoding's
//! tables cannot be loaded the heuristic counter takes over.

use std::sync::OnceLock;

use tiktoken_rs::{CoreBPE, cl100k_base, o200k_base};
use tracing::warn;

use crate::core::tokens::{HeuristicCounter, TokenCounter};
use crate::io::config::{TokenConfig, TokenEncoding};

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn load(
    cell: &'static OnceLock<Option<CoreBPE>>,
    name: &str,
    init: fn() -> anyhow::Result<CoreBPE>,
) -> Option<&'static CoreBPE> {
    cell.get_or_init(|| match init() {
        Ok(bpe) => Some(bpe),
        Err(err) => {
            warn!(encoding = name, error = %err, "tokenizer unavailable; using heuristic estimate");
            None
        }
    })
    .as_ref()
}

/// Counts tokens with a tiktoken encoding.
pub struct BpeCounter {
    bpe: &'static CoreBPE,
}

impl TokenCounter for BpeCounter {
    fn count(&self, text: &str) -> u64 {
        self.bpe.encode_with_special_tokens(text).len() as u64
    }
}

/// Counter selected by configuration.
pub fn build_counter(config: &TokenConfig) -> Box<dyn TokenCounter> {
    let heuristic = HeuristicCounter {
        chars_per_token: config.heuristic_chars_per_token,
    };
    let bpe = match config.encoding {
        TokenEncoding::Cl100kBase => load(&CL100K, "cl100k_base", cl100k_base),
        TokenEncoding::O200kBase => load(&O200K, "o200k_base", o200k_base),
        TokenEncoding::Heuristic => None,
    };
    match bpe {
        Some(bpe) => Box::new(BpeCounter { bpe }),
        None => Box::new(heuristic),
    }
}
