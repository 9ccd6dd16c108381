// Raw fact extraction: run the source analysis tool and turn its facts into
// draft descriptions plus interface records.

pub mod facts;
pub mod synth;
pub mod tool;

pub use facts::Facts;
pub use synth::{synthesize, Synthesis};
pub use tool::{Extractor, ToolExtractor};
