//! Pipeline stages, one module per stage.
//!
//! ```text
//! raw DocTags text
//!        │
//!   [parse]    tagged markup → DocTagDocument tree
//!        │
//!  [resolve]   declared convention → base Transform for this raster
//!        │
//!  [correct]   compose scaling correction, rewrite every box to pixels
//!        │
//!        ├── [overlay]   color-coded boxes drawn on the page render
//!        └── [extract]   per-region crops of the page render
//! ```
//!
//! Each stage is a plain function over owned data; [`crate::process`] wires
//! them together for the common per-page flow, and callers with unusual
//! needs (sweeping candidate factors, cropping non-picture regions) call
//! the stages directly.

pub mod correct;
pub mod extract;
pub mod overlay;
pub mod parse;
pub mod resolve;
