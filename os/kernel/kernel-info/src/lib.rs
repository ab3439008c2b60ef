//! # Paging Configuration
//!
//! This crate is the single source of truth for the constants that shape the
//! simulated paging subsystem: page geometry, page-table fan-out, symbol table
//! capacity, swap device limits and the status codes surfaced to the
//! instruction interpreter.
//!
//! ## Addressing modes
//!
//! Two addressing modes exist and are selected at **build time**:
//!
//! | Feature   | Page size | Page table                         | Virtual address width |
//! |-----------|-----------|------------------------------------|-----------------------|
//! | *(none)*  | 256 B     | flat array of `FLAT_MAX_PAGES`     | 22 bit                |
//! | `mm64`    | 4 KiB     | lazily allocated 5-level radix tree | 57 bit                |
//!
//! ```text
//! mm64 virtual address:
//! | 56‒48 | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PGD  |  P4D  |  PUD  |  PMD  |  PT   | Offset |
//!
//! flat virtual address:
//! | 21‒8  | 7‒0    |
//! |  PGN  | Offset |
//! ```
//!
//! Every crate that cares about the mode re-exports a `mm64` feature that
//! forwards here, so a single switch on the top-level binary flips the whole
//! stack consistently.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
