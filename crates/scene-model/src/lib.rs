//! scenemux Scene Model
//!
//! Defines the data contracts shared by the render pipeline:
//! - **Scene / SceneCatalog:** the fixed, ordered set of renderable units
//! - **QualityLevel:** render quality flag and resolution tag
//! - **MediaLayout:** where the render tool deposits each scene's video
//! - **MergeManifest:** the ordered artifact list fed to the concat demuxer
//!
//! Catalog order is authoritative: scenes launch in that order and are
//! concatenated in that order, whatever order the renders finish in.

pub mod layout;
pub mod manifest;
pub mod quality;
pub mod scene;

pub use layout::*;
pub use manifest::*;
pub use quality::*;
pub use scene::*;
