//! Registry trait for self-registering implementations.
//!
//! Adapter, aggregator and storage implementations each declare the name
//! they are referenced by in configuration together with a factory.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. `"fixed_rate"` for `kind = "fixed_rate"` in an `[[adapters]]` entry.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
