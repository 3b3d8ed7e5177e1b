fn main() {
    // Set linker flags for macOS so a bundled libpdfium.dylib resolves
    #[cfg(target_os = "macos")]
    {
        println!("cargo:rustc-link-arg=-Wl,-rpath,@executable_path/../Frameworks");
    }

    println!("cargo:rerun-if-env-changed=MARKDOWN_LABS_PDFIUM_PATH");
}
