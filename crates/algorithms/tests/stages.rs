//! Stages chained through the `Algorithm` trait, matching the direct calls

use rillmap_algorithms::flood::FloodRiskCompositor;
use rillmap_algorithms::hydrology::{
    Conditioner, DepressionResolver, FlowAccumulation, FlowDirection, PourPoint, WatershedDelineator,
    WatershedParams,
};
use rillmap_algorithms::prelude::*;
use rillmap_algorithms::terrain::Slope;

fn dem() -> Raster<f64> {
    let mut dem = Raster::new(16, 16);
    dem.set_transform(GeoTransform::new(0.0, 160.0, 10.0, -10.0));
    for row in 0..16 {
        for col in 0..16 {
            let z = 50.0 - row as f64 + (col as f64 - 8.0).abs() * 0.7;
            dem.set(row, col, z).unwrap();
        }
    }
    dem.set(6, 8, 30.0).unwrap();
    dem.set(2, 2, f64::NAN).unwrap();
    dem
}

/// Cell-wise equality with NaN equal to NaN
fn same(a: &Raster<f64>, b: &Raster<f64>) -> bool {
    a.shape() == b.shape()
        && a.data()
            .iter()
            .zip(b.data().iter())
            .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}

#[test]
fn trait_chain_matches_functions() {
    let conditioned = Conditioner.execute_default(dem()).unwrap();
    assert_eq!(conditioned.report.non_finite_cells, 1);

    let resolved = DepressionResolver.execute_default(conditioned.dem.clone()).unwrap();
    let direct = resolve_depressions(&conditioned.dem, &ResolveParams::default()).unwrap();
    assert!(same(&resolved.dem, &direct.dem));

    let fdir = FlowDirection.execute_default(resolved.dem.clone()).unwrap();
    let acc = FlowAccumulation.execute_default(fdir.clone()).unwrap();
    assert!(same(&acc, &flow_accumulation(&fdir).unwrap()));

    let basins = WatershedDelineator
        .execute((fdir.clone(), vec![PourPoint::cell(15, 8)]), WatershedParams { min_cells: 0 })
        .unwrap();
    assert_eq!(basins.basins.len(), 1);
    assert_eq!(basins.basins[0].cell_count as f64, acc.get(15, 8).unwrap());

    let slope_deg = Slope.execute_default(resolved.dem.clone()).unwrap();
    let risk = FloodRiskCompositor
        .execute(
            (resolved.dem.clone(), acc, Some(resolved.depressions.clone()), None),
            RiskParams::default(),
        )
        .unwrap();
    assert!(same(&risk.slope, &slope_deg));
    assert_eq!(FloodRiskCompositor.name(), "Flood Risk");
}
