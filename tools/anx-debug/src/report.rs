//! Terminal reports

use anx7625::pll::{self, PllCoefficients};
use anx7625::sim::SimStats;
use anx7625::timing::ltdc_pixel_clock;
use anx7625::{DisplayTiming, Edid, VideoMode};
use colored::Colorize;

const WIDTH: usize = 70;

pub fn header(title: &str) {
    println!("{}", "=".repeat(WIDTH));
    println!("{}", title.cyan().bold());
    println!("{}", "=".repeat(WIDTH));
}

pub fn footer() {
    println!("\n{}", "=".repeat(WIDTH));
}

/// Deviation of the generated clock from the requested one, in ppm
pub fn error_ppm(requested_hz: u32, coeffs: &PllCoefficients) -> f64 {
    let actual = pll::XTAL_FRQ as f64 * coeffs.m as f64 / coeffs.n as f64 / coeffs.post_divider as f64;
    (actual - requested_hz as f64) / requested_hz as f64 * 1e6
}

pub fn print_pll(requested_hz: u32, coeffs: &PllCoefficients) {
    header(&format!("PLL for {} Hz", requested_hz));

    println!("\n{}", "Coefficients:".white().bold());
    println!("  M: {} ({:#08x})", coeffs.m, coeffs.m);
    println!("  N: {} ({:#08x})", coeffs.n, coeffs.n);
    println!(
        "  Post divider: {} (register field {})",
        coeffs.post_divider,
        coeffs.divider_field()
    );

    println!("\n{}", "Result:".white().bold());
    println!("  PLL output: {} Hz", coeffs.pll_output_hz());
    println!("  Pixel clock: {} Hz", coeffs.pixel_clock_hz());

    let ppm = error_ppm(requested_hz, coeffs);
    let ppm_text = format!("{:+.3} ppm", ppm);
    println!(
        "  Error: {}",
        if ppm.abs() < 1.0 {
            ppm_text.green()
        } else {
            ppm_text.yellow()
        }
    );

    footer();
}

pub fn print_modes() {
    header("Standard Video Modes");

    println!(
        "\n  {:<10} {:>9} {:>9} {:>6} {:>6} {:>4}",
        "Mode".white().bold(),
        "pclk kHz",
        "scan-out",
        "htotal",
        "vtotal",
        "PD"
    );
    for mode in VideoMode::ALL {
        let Some(timing) = mode.timing() else {
            println!("  {:<10} {}", mode.name(), "preferred timing from EDID".dimmed());
            continue;
        };
        let snapped = ltdc_pixel_clock(timing.pixel_clock_khz);
        let divider = match pll::calculate(snapped * 1000) {
            Ok(coeffs) => coeffs.post_divider.to_string().normal(),
            Err(_) => "-".red(),
        };
        println!(
            "  {:<10} {:>9} {:>9} {:>6} {:>6} {:>4}",
            mode.name(),
            timing.pixel_clock_khz,
            snapped,
            timing.htotal(),
            timing.vtotal(),
            divider
        );
    }

    footer();
}

pub fn print_timing(timing: &DisplayTiming) {
    println!("\n{}", "Timing:".white().bold());
    println!("  Resolution: {}x{} @ {} Hz", timing.hactive, timing.vactive, timing.refresh_hz());
    println!("  Pixel clock: {} kHz", timing.pixel_clock_khz);
    println!(
        "  Horizontal: front {} sync {} back {} (total {}) {}",
        timing.hfront_porch,
        timing.hsync_len,
        timing.hback_porch,
        timing.htotal(),
        if timing.hsync_positive { "+hsync" } else { "-hsync" }
    );
    println!(
        "  Vertical: front {} sync {} back {} (total {}) {}",
        timing.vfront_porch,
        timing.vsync_len,
        timing.vback_porch,
        timing.vtotal(),
        if timing.vsync_positive { "+vsync" } else { "-vsync" }
    );
}

pub fn print_edid(edid: &Edid) {
    println!("\n{}", "Display:".white().bold());
    println!("  Manufacturer: {}", edid.manufacturer());
    println!("  Product: {:#06x}", edid.product_code);
    if let Some(name) = edid.name() {
        println!("  Name: {}", name);
    }
    println!("  EDID version: {}.{}", edid.version, edid.revision);
    if let Some(bpc) = edid.panel_bits_per_color {
        println!("  Bits per color: {}", bpc);
    }
    println!("  Size: {} x {} cm", edid.width_cm, edid.height_cm);
    println!("  Extension blocks: {}", edid.extensions);

    match edid.preferred_timing() {
        Ok(timing) => print_timing(&timing),
        Err(e) => println!("\n  {} {}", "[WARNING]".yellow().bold(), e),
    }
}

pub fn print_stats(stats: &SimStats, elapsed_ms: u64) {
    println!("\n{}", "Simulated bus activity:".white().bold());
    println!("  Flash-load polls: {}", stats.flash_polls);
    println!("  Status reads: {}", stats.status_reads);
    println!("  AUX operations: {}", stats.aux_ops);
    println!("  EDID chunk reads: {}", stats.chunk_reads);
    println!("  Segment selects: {}", stats.segment_selects);
    println!("  AUX resets: {}", stats.aux_resets);
    println!("  Simulated time: {} ms", elapsed_ms);
}
