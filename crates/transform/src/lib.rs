//! # Chatloom Transform
//!
//! Pure passes over message histories:
//!
//! - [`filter_messages`] keeps or drops messages by name, kind and id
//! - [`merge_message_runs`] folds adjacent same-kind messages together
//! - [`trim_messages`] cuts a history down to a token budget
//!
//! Each pass also exists as a deferred [`MessageTransform`] so passes can be
//! configured once and chained in a [`Pipeline`].

pub mod filter;
pub mod merge;
pub mod splitter;
pub mod token;
pub mod transform;
pub mod trim;

pub use filter::{FilterOptions, MessageFilter, filter_messages};
pub use merge::{RunMerger, merge_message_runs};
pub use splitter::{FnSplitter, NewlineSplitter, TextSplitter, split_on_newlines};
pub use token::{
    CharEstimateCounter, ContentTokenizer, FnTokenCounter, PerMessageCounter, TokenCounter,
};
pub use transform::{MessageTransform, Pipeline};
pub use trim::{Strategy, TrimOptions, Trimmer, trim_messages};
