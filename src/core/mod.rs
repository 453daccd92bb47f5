//! Core Module
//!
//! Estado central do núcleo e o que todo o resto usa: logging, sanity
//! checks, boot e o tratamento de panic.

pub mod boot;
pub mod kernel;
pub mod logging;
pub mod sanity;

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod entry;
#[cfg(all(target_arch = "x86", target_os = "none"))]
pub mod panic;

#[cfg(any(test, feature = "self_test"))]
pub mod test;
