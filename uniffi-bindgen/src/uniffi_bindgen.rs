//! Entry point for generating foreign-language bindings for MeldKit.

fn main() {
    uniffi::uniffi_bindgen_main();
}
