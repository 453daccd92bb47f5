//! # Boot
//!
//! O que o bootstrap deixa na memória para o núcleo consumir.

pub mod memory_map;
