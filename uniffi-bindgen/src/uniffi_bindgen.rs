//! Generates Swift and Kotlin bindings for the `applock` library.

fn main() {
    uniffi::uniffi_bindgen_main();
}
