//! Cleanup utility for integration test resources
//!
//! This binary removes domains and volumes left behind by interrupted test runs.

use vutils::connection::{Hypervisor, VirshConnection};
use vutils::errors::HypervisorResult;

// Import shared constants from the library
use integration_tests::{is_test_resource, test_pool, CONNECT_ENV};

fn cleanup_domains(conn: &VirshConnection) -> HypervisorResult<usize> {
    println!("Cleaning up integration test domains...");

    let mut cleaned = 0;
    for name in conn.list_all_domains()?.into_iter().filter(|n| is_test_resource(n)) {
        print!("  Removing domain {}... ", name);
        if conn.domain_is_active(&name)? {
            conn.destroy_domain(&name)?;
        }
        match conn.undefine_domain(&name) {
            Ok(()) => {
                println!("✓");
                cleaned += 1;
            }
            Err(e) => {
                println!("✗ (failed)");
                eprintln!("    Error: {}", e);
            }
        }
    }
    Ok(cleaned)
}

fn cleanup_volumes(conn: &VirshConnection, pool: &str) -> HypervisorResult<usize> {
    println!("Cleaning up integration test volumes in pool '{}'...", pool);

    let mut cleaned = 0;
    for name in conn.list_volumes(pool)?.into_iter().filter(|n| is_test_resource(n)) {
        print!("  Removing volume {}... ", name);
        match conn.delete_volume(pool, &name) {
            Ok(()) => {
                println!("✓");
                cleaned += 1;
            }
            Err(e) => {
                println!("✗ (failed)");
                eprintln!("    Error: {}", e);
            }
        }
    }
    Ok(cleaned)
}

fn main() {
    let Ok(uri) = std::env::var(CONNECT_ENV) else {
        println!("{} is not set, nothing to clean up", CONNECT_ENV);
        return;
    };
    let conn = match VirshConnection::open(&uri) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", uri, e);
            std::process::exit(1);
        }
    };

    let mut errors = Vec::new();

    match cleanup_domains(&conn) {
        Ok(n) => println!("Cleanup completed: {} domain(s) removed", n),
        Err(e) => {
            eprintln!("Error during domain cleanup: {}", e);
            errors.push(format!("domains: {}", e));
        }
    }

    match cleanup_volumes(&conn, &test_pool()) {
        Ok(n) => println!("Cleanup completed: {} volume(s) removed", n),
        Err(e) => {
            eprintln!("Error during volume cleanup: {}", e);
            errors.push(format!("volumes: {}", e));
        }
    }

    if !errors.is_empty() {
        eprintln!("Cleanup completed with errors: {}", errors.join(", "));
        std::process::exit(1);
    }
}
