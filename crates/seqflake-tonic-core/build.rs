/// Builds the gRPC client and server code for `proto/seqflake.proto` using
/// `tonic-prost-build`.
///
/// Besides the generated modules, the encoded file descriptor set is written
/// to `OUT_DIR/seqflake_descriptor.bin` so the server can expose gRPC
/// reflection.
///
/// # Panics
///
/// Panics if code generation fails (for example when `protoc` is missing).
///
/// # Output
///
/// Generated code is accessible via:
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("seqflake");
/// }
/// ```
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("seqflake_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/seqflake.proto");
    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/seqflake.proto"], &["proto"])
        .unwrap();
}
