//! End-to-end scenarios for cairn, driven against real repositories in
//! temporary directories.

mod scenarios;
