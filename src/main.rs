// 🏠 Housing Stats - offline CLI
// Same computations as the server, printed to the terminal

use anyhow::{bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};

use housing_stats::{fit_area, format_float, render_area_chart, Config, Dataset};

const USAGE: &str =
    "usage: housing-stats [--data PATH] <areas | price AREA | ela AREA | plot AREA OUT.png>";

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let mut data_path = Config::from_env()?.data_path;
    if args.first().map(String::as_str) == Some("--data") {
        if args.len() < 2 {
            bail!("--data needs a path\n{}", USAGE);
        }
        data_path = PathBuf::from(args.remove(1));
        args.remove(0);
    }

    let dataset = Dataset::load(&data_path)?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["areas"] => run_areas(&dataset),
        ["price", area] => run_price(&dataset, area),
        ["ela", area] => run_ela(&dataset, area),
        ["plot", area, out] => run_plot(&dataset, area, Path::new(out)),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn run_areas(dataset: &Dataset) -> Result<()> {
    let areas = dataset.areas();
    println!("📍 {} areas ({} rows)", areas.len(), dataset.len());
    for area in areas {
        println!("   {}", area);
    }
    Ok(())
}

fn run_price(dataset: &Dataset, area: &str) -> Result<()> {
    let rows = dataset.latest_for_area(area);
    let Some(row) = rows.first() else {
        bail!("no rows for area {:?} at the latest date", area);
    };

    println!("🏠 {} ({})", row.area, row.code);
    println!("   date:             {}", row.date);
    println!("   average price:    {}", format_float(row.average_price));
    println!("   number of crimes: {}", format_float(row.no_of_crimes));
    Ok(())
}

fn run_ela(dataset: &Dataset, area: &str) -> Result<()> {
    let fit = fit_area(dataset, area)?;
    let table = fit.coefficients();

    println!("📈 Price elasticity of sales - {}", area);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   {:<12} {:>12} {:>12}", "var", "coef", "pvalue");
    for row in &table {
        println!(
            "   {:<12} {:>12.6} {:>12}",
            row.var,
            row.coef,
            row.pvalue.map_or_else(|| "-".to_string(), |p| format!("{:.6}", p))
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   n = {}, df = {}, R² = {:.4}", fit.n_obs, fit.df_resid, fit.r_squared);
    Ok(())
}

fn run_plot(dataset: &Dataset, area: &str, out: &Path) -> Result<()> {
    let png = render_area_chart(dataset, area)?;
    std::fs::write(out, &png).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("✓ Wrote {} ({} bytes)", out.display(), png.len());
    Ok(())
}
