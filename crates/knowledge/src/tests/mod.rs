//! End-to-end scenarios over the engine with in-process fakes.

mod support;
