pub mod analyze;
pub mod monitor;
pub mod organize;
pub mod run;

use trialmon::stats::SummaryRecord;

// FIXED-WIDTH SUMMARY TABLE FOR THE TERMINAL (CSV GOES TO DISK SEPARATELY)
pub fn print_summary(benchmark: &str, summary: &SummaryRecord) {
    println!("  {}", benchmark.to_uppercase());
    println!(
        "  {:<8} {:>10} {:>10} {:>10} {:>10}",
        "", "TOTAL", "REAL", "USER", "SYS"
    );
    println!(
        "  {} {} {} {} {}",
        "-".repeat(8),
        "-".repeat(10),
        "-".repeat(10),
        "-".repeat(10),
        "-".repeat(10),
    );
    for (label, t) in summary.rows() {
        println!(
            "  {:<8} {:>9.3}s {:>9.3}s {:>9.3}s {:>9.3}s",
            label.to_uppercase(),
            t.total,
            t.real,
            t.user,
            t.sys
        );
    }
}
