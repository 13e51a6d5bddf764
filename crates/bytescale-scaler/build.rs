fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc unless the environment provides one.
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        // SAFETY: build scripts are single-threaded.
        unsafe { std::env::set_var("PROTOC", protoc) };
    }

    println!("cargo:rerun-if-changed=proto/externalscaler.proto");
    tonic_build::compile_protos("proto/externalscaler.proto")?;
    Ok(())
}
