//! # omicron_tools
//!
//! omicron_tools is a set of monitoring and maintenance utilities for the Omicron
//! gravitational-wave trigger pipeline, written in Rust. Omicron runs continuously on an
//! HTCondor cluster, producing trigger files (ROOT, HDF5 and LIGO_LW XML) for a set of
//! channels grouped into processing groups. These tools answer two questions about such a
//! deployment:
//!
//! - Is the processing healthy? `omicron_status` inspects the HTCondor queue and the trigger
//! archive for one group and writes Nagios-compatible JSON status documents, PNG plots and an
//! optional HTML dashboard.
//! - How do I combine trigger files? `omicron_merge` merges a contiguous run of trigger files
//! into a single file, removing the inputs if asked.
//!
//! ## Installation
//!
//! The only method of install is from source.
//!
//! ### HDF5
//!
//! The latency archive and the HDF5 merger link against HDF5, which must be installed before
//! building. Typically this will be installed using a package manager (homebrew, apt, etc),
//! and the Rust libraries will auto detect the location of the HDF install. If HDF5 lives in
//! a custom location, write the following snippet into `.cargo/config.toml`:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### External tools
//!
//! The scheduler check runs `condor_q`. Merging ROOT files runs `hadd` and merging LIGO_LW
//! XML runs `ligolw_add`; these must be on the path when those file types are used.
//!
//! ### Building & Install
//!
//! Use `cargo install --path ./omicron_status` and `cargo install --path ./omicron_merge`
//! from the top level of the repository.
//!
//! ## Configuration
//!
//! `omicron_status` reads a YAML file with one section per processing group. A template can
//! be generated with `omicron_status new <path>`:
//!
//! ```yaml
//! author:
//!   name: omicron_status
//!   email: ''
//! groups:
//!   GW:
//!     channels:
//!     - L1:GDS-CALIB_STRAIN
//!     frametype: L1_HOFT_C00
//!     state-flag: L1:DMT-ANALYSIS_READY:1
//!     segment-duration: 64.0
//!     overlap-duration: 4.0
//!     file-types:
//!     - root
//!     - h5
//!     - xml.gz
//!     state-segments: null
//!     frame-cache: null
//!     minimum-gap: null
//! ```
//!
//! - channels: The channels processed by the group
//! - frametype: The frame type Omicron reads
//! - state-flag: The data quality flag gating the analysis
//! - segment-duration: Length of one Omicron chunk in seconds
//! - overlap-duration: Padding shared by neighbouring chunks in seconds
//! - file-types: The trigger file extensions to check
//! - state-segments: Optional segwizard file of the active state segments
//! - frame-cache: Optional LAL cache of the available frames
//! - minimum-gap: Gaps touching a segment edge shorter than this are unresolvable
//! (defaults to segment-duration)
//!
//! The expected coverage comes from state-segments when given, then from the frame cache,
//! and otherwise is the full requested span. It is shrunk by half the overlap at each edge.
//!
//! ## Output
//!
//! For a group `G` the output directory receives
//!
//! - `nagios-condor-G.json`, `nagios-gaps-G.json`, `nagios-overlap-G.json` and
//! `nagios-latency-G.json` status documents
//! - `nagios-latency-<tag>.hdf`, the latency history (one dataset per channel and file type)
//! - `nagios-condor-G.png` and one `nagios-latency-<channel>.png` per channel
//! - `index.html` when the dashboard is requested
pub mod archive;
pub mod config;
pub mod coverage;
pub mod error;
pub mod file_name;
pub mod gps;
pub mod html;
pub mod latency_archive;
pub mod merge;
pub mod plot;
pub mod report;
pub mod scheduler;
pub mod segment_source;
pub mod segments;
pub mod status;
