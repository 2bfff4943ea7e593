//! Shared test support
