//! Tests for qualified names, namespace bindings and selectors
