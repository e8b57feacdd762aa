//! Print chart reports for the configured user
//!
//! Usage: sweetsync_report [week|month|year]...
//! With no arguments every period is printed.

use std::sync::Arc;

use sweetsync::analytics::{ChartAggregator, PeriodReport, SystemClock};
use sweetsync::config::{Config, ENV_USER_ID};
use sweetsync::models::ChartPeriod;
use sweetsync::service::ReadingsService;

fn print_report(report: &PeriodReport) {
    let stats = &report.statistics;
    println!("== {} ({}) ==", report.title, report.display_name);
    println!("   {}", report.subtitle);

    if let Some(warning) = &report.stale_warning {
        println!("   ! {}", warning);
    }

    if stats.count == 0 {
        println!("   No readings");
        println!();
        return;
    }

    println!(
        "   Average {:.1} mg/dL over {} readings, {:.0}% in range",
        stats.average, stats.count, stats.in_range_percentage
    );
    println!(
        "   Max {:.0} on {}, min {:.0} on {}",
        stats.max, stats.max_date, stats.min, stats.min_date
    );
    println!(
        "   Low {} / Normal {} / High {}",
        stats.low_count, stats.normal_count, stats.high_count
    );
    println!("   Last reading {} days ago", stats.days_since_last_reading);

    for point in &report.series.points {
        let label = point.label.replace('\n', " ");
        match point.value {
            Some(value) => println!("   {:<20} {:>6.1}", label, value),
            None => println!("   {:<20} {:>6}", label, "-"),
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let periods = std::env::args()
        .skip(1)
        .map(|arg| ChartPeriod::from_str(&arg).ok_or_else(|| format!("Unknown period: {}", arg)))
        .collect::<Result<Vec<_>, _>>()?;
    let periods = if periods.is_empty() { ChartPeriod::ALL.to_vec() } else { periods };

    let config = Config::from_env()?;
    let Some(user_id) = config.user_id.clone() else {
        return Err(format!("{} must be set", ENV_USER_ID).into());
    };

    let session = config.session();
    let storage = config.open_storage(session.clone())?;
    let service = ReadingsService::new(
        storage.repository,
        storage.cache_store,
        session,
        ChartAggregator::new(Arc::new(SystemClock), config.calendar),
    );

    let state = service.load_readings().await;
    if let Some(err) = &state.error_message {
        eprintln!("Warning: {}", err);
    }
    println!("SweetSync report for {} ({} readings)", user_id, state.readings.len());
    println!();

    for period in periods {
        print_report(&service.period_report(period));
    }

    Ok(())
}
