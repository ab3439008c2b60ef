//! # Kernel synchronization primitives
//!
//! The paging core needs exactly one kind of lock: a short critical section
//! that never suspends. Every process's address space sits behind one
//! [`SpinLock`], and every physical memory device guards its byte store and
//! free-frame list with another. Lock order is always *address space, then
//! device*; devices never call back into an address space.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
