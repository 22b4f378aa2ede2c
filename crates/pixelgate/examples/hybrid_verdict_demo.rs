//! Hybrid Verdict Demo
//!
//! Demonstrates the validation pipeline end to end:
//! - Baseline creation on first run
//! - Pixel comparison with ignore regions
//! - Gray-band escalation to the similarity model
//! - Mismatch policies and baseline approval
//!
//! Run with: cargo run --example hybrid_verdict_demo -p pixelgate

use image::{Rgba, RgbaImage};
use pixelgate::prelude::*;

fn main() -> PixelgateResult<()> {
    println!("=== Hybrid Verdict Demo ===\n");

    let root = std::env::temp_dir().join("pixelgate-demo");
    if root.exists() {
        std::fs::remove_dir_all(&root)?;
    }

    // Demo 1: Configuration
    println!("1. Configuration");
    println!("   -------------");
    let config = EngineConfig {
        store: StoreConfig {
            root: root.clone(),
            ..StoreConfig::default()
        },
        ..EngineConfig::default()
    };
    println!("   Tolerance: {:.2}%", config.tolerance * 100.0);
    println!(
        "   Gray band: {:.0}% - {:.0}%",
        config.gray_zone_lower * 100.0,
        config.gray_zone_upper * 100.0
    );
    println!("   Model threshold: {}", config.model_threshold);
    println!("   Store root: {}\n", root.display());

    let validator = Validator::new(config)?;
    let request = ValidationRequest::new(BaselineIdentity::new("CheckoutTest", "cart summary"));

    // Demo 2: First run
    println!("2. First Run");
    println!("   ---------");
    let page = mock_page(None);
    report(&validator.validate(&StaticCapture(page.clone()), &request));

    // Demo 3: Identical capture
    println!("\n3. Identical Capture");
    println!("   -----------------");
    report(&validator.validate(&StaticCapture(page), &request));

    // Demo 4: Gray band change decided by the model
    println!("\n4. Small Layout Shift (gray band)");
    println!("   ------------------------------");
    report(&validator.validate(&StaticCapture(mock_page(Some(14))), &request));

    // Demo 5: Masking the dynamic banner
    println!("\n5. Same Shift With Banner Masked");
    println!("   -----------------------------");
    let masked = request.clone().with_ignore_spec("0,0,200,30");
    report(&validator.validate(&StaticCapture(mock_page(Some(14))), &masked));

    // Demo 6: Policies on a large change
    println!("\n6. Mismatch Policies");
    println!("   -----------------");
    let broken = StaticCapture(RgbaImage::from_pixel(200, 150, Rgba([20, 20, 20, 255])));
    for policy in [MismatchBehavior::Fail, MismatchBehavior::Warn, MismatchBehavior::Ignore] {
        print!("   policy={:<6} ", policy.to_string());
        report(&validator.validate(&broken, &request.clone().with_policy(policy)));
    }

    // Demo 7: Approving the new look
    println!("\n7. Approve Latest Capture");
    println!("   ----------------------");
    let update = validator.approve(&request.identity)?;
    println!("   New baseline: {}", update.path.display());
    if let Some(backup) = update.backup {
        println!("   Previous archived at: {}", backup.display());
    }
    report(&validator.validate(&broken, &request));

    println!("\n=== Demo Complete ===");
    Ok(())
}

/// A white page with a blue banner; `shift` moves the banner down
fn mock_page(shift: Option<u32>) -> RgbaImage {
    let offset = shift.unwrap_or(0);
    RgbaImage::from_fn(200, 150, |_, y| {
        if y >= offset && y < offset + 20 {
            Rgba([30, 80, 200, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

fn report(verdict: &Verdict) {
    let record = &verdict.record;
    println!("   {verdict}");
    if let Some(strategy) = record.strategy {
        println!(
            "     strategy={strategy} severity={} similarity={}",
            record.severity,
            record
                .similarity
                .map_or_else(|| "-".to_string(), |s| format!("{s:.3}"))
        );
    }
}
