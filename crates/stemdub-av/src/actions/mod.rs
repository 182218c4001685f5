//! Pipeline stage actions: source download, audio extraction, stem
//! separation, remuxing, and playlist probing.

mod download;
mod extract;
mod mux;
mod probe;
mod separate;

pub use download::{download_args, download_sources};
pub use extract::{extract_audio, extract_args};
pub use mux::{mux_args, remux_with_stem};
pub use probe::{parse_playlist, probe_playlist, PlaylistEntry, ProbeOutcome};
pub use separate::separate_stems;
