fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protos = [
        "proto/registry.proto",
        "proto/anomaly.proto",
        "proto/telemetry_gateway.proto",
    ];

    // protox compiles descriptors in-process, so builds do not depend on a
    // protoc binary being installed.
    let file_descriptors = protox::compile(protos, ["proto"])?;

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_fds(file_descriptors)?;

    for proto in protos {
        println!("cargo:rerun-if-changed={proto}");
    }

    Ok(())
}
