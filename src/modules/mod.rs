pub mod books;

use bookstore_kernel::ModuleRegistry;

/// Every module shipped by the bookstore API, in mount order.
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register(books::create_module());
}
