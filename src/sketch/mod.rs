// src/sketch/mod.rs
pub mod canvas;
