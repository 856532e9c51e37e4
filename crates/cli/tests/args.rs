use clap::Parser;

#[path = "../src/args.rs"]
mod args;

use args::Args;

#[test]
fn defaults_match_the_documented_external_interface() {
    let args = Args::parse_from(["mesh-node"]);
    assert!(args.server_enabled());
    assert!(args.client_enabled());
    assert_eq!(args.server_address, "[::]:6000");
    assert_eq!(args.client_addresses, vec!["[::1]:6000".to_string()]);
    assert!(args.atomicity_override().is_none());
}

#[test]
fn no_server_flag_disables_the_server() {
    let args = Args::parse_from(["mesh-node", "--no-server"]);
    assert!(!args.server_enabled());
    assert!(args.client_enabled());
}

#[test]
fn explicit_atomicity_flags_are_distinguishable_from_unset() {
    let on = Args::parse_from(["mesh-node", "--atomicity"]);
    assert_eq!(on.atomicity_override(), Some(true));

    let off = Args::parse_from(["mesh-node", "--no-atomicity"]);
    assert_eq!(off.atomicity_override(), Some(false));
}

#[test]
fn server_address_parses_host_and_port() {
    let args = Args::parse_from(["mesh-node", "--server-address", "127.0.0.1:7000"]);
    let (host, port) = args.parse_server_address().unwrap();
    assert_eq!(host, "127.0.0.1");
    assert_eq!(port, 7000);
}
