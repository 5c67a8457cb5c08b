// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
fn main() -> Result<(), Box<dyn std::error::Error>> {
  let protoc = protoc_bin_vendored::protoc_bin_path().expect("bundled protoc must be available");
  std::env::set_var("PROTOC", protoc);
  println!("cargo:rerun-if-changed=src/proto");
  tonic_build::configure()
    .build_server(true)
    .build_client(true)
    .compile(
      &[
        "src/proto/service_user.proto",
        "src/proto/service_resource.proto",
        "src/proto/bff_user.proto",
      ],
      &["src/proto"],
    )?;
  Ok(())
}
