mod common;

use approx::assert_abs_diff_eq;
use common::{grid, init_logging, ramp, read_raster, write_raster};
use stackprep::config::{CoherenceConfig, CustomBounds, PrepConfig};
use stackprep::core::{PrepDriver, PreparedRaster, RasterInput};
use stackprep::types::{CropPolicy, LookFactors, PrepError, ProcessingStage, RasterKind};
use std::path::Path;
use tempfile::TempDir;

fn config(looks: usize, crop: CropPolicy) -> PrepConfig {
    PrepConfig {
        looks: LookFactors::new(looks, looks).expect("valid looks"),
        crop,
        workers: Some(2),
        ..Default::default()
    }
}

fn find<'a>(prepared: &'a [PreparedRaster], source: &Path) -> &'a PreparedRaster {
    prepared
        .iter()
        .find(|p| p.source == source)
        .expect("no report for source raster")
}

#[test]
fn test_intersection_multilook() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");

    let a = write_raster(
        dir.path(),
        "20150101-20150113_unw.tif",
        &ramp(9, 9),
        grid(150.0, -33.0),
        &[("DATA_TYPE", "ORIGINAL_IFG")],
        None,
    );
    let b = write_raster(
        dir.path(),
        "20150113-20150125_unw.tif",
        &(ramp(8, 8) + 100.0),
        grid(150.5, -33.5),
        &[],
        None,
    );

    let driver = PrepDriver::new(config(2, CropPolicy::Intersection)).expect("driver");
    let prepared = driver
        .run(&[
            RasterInput::new(&a, RasterKind::Interferogram),
            RasterInput::new(&b, RasterKind::Interferogram),
        ])
        .expect("batch should succeed");
    assert_eq!(prepared.len(), 2);

    let report_a = find(&prepared, &a);
    assert_eq!(
        report_a.output,
        dir.path().join("20150101-20150113_unw_2rlks_1cr.tif")
    );
    assert_eq!((report_a.rows, report_a.cols), (4, 4));
    assert_eq!(report_a.stage(), ProcessingStage::Multilooked);
    assert_eq!(report_a.x_step(), 1.0);
    assert_eq!(report_a.y_step(), -1.0);
    let extent = report_a.extent();
    assert_eq!((extent.xmin, extent.ymin, extent.xmax, extent.ymax), (150.5, -37.5, 154.5, -33.5));
    assert_eq!(report_a.nan_fraction_mean, Some(0.0));

    let out_a = read_raster(&report_a.output);
    assert_eq!(out_a.geotransform, [150.5, 1.0, 0.0, -33.5, 0.0, -1.0]);
    assert_eq!(out_a.data.dim(), (4, 4));
    assert_abs_diff_eq!(out_a.data[[0, 0]], 17.5, epsilon = 1e-5); // (12+13+22+23)/4
    assert_abs_diff_eq!(out_a.data[[3, 3]], 83.5, epsilon = 1e-5); // (78+79+88+89)/4
    assert_eq!(out_a.item("DATA_TYPE").as_deref(), Some("MULTILOOKED_IFG"));

    let out_b = read_raster(&find(&prepared, &b).output);
    assert_eq!(out_b.geotransform, out_a.geotransform);
    assert_abs_diff_eq!(out_b.data[[0, 0]], 106.5, epsilon = 1e-5);
    assert_eq!(out_b.item("DATA_TYPE").as_deref(), Some("MULTILOOKED_IFG"));
}

#[test]
fn test_coherence_mask_and_passthrough_copy() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");

    let ifg = write_raster(
        dir.path(),
        "20150101-20150113_unw.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[("DATA_TYPE", "ORIGINAL_IFG")],
        None,
    );
    let mut coherence = ndarray::Array2::<f32>::from_elem((4, 4), 0.9);
    coherence.column_mut(0).fill(0.05);
    coherence[[2, 2]] = 0.1;
    write_raster(
        dir.path(),
        "20150101-20150113_filt_cc.tif",
        &coherence,
        grid(150.0, -33.0),
        &[],
        None,
    );
    let dem = write_raster(
        dir.path(),
        "dem.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[("DATA_TYPE", "ORIGINAL_DEM"), ("SOURCE", "synthetic")],
        None,
    );

    let config = PrepConfig {
        coherence: CoherenceConfig {
            threshold: Some(0.1),
            dir: Some(dir.path().to_path_buf()),
            files: vec!["20150101-20150113_filt.cc".to_string()],
        },
        ..config(1, CropPolicy::Unchanged)
    };
    let prepared = PrepDriver::new(config)
        .expect("driver")
        .run(&[
            RasterInput::new(&ifg, RasterKind::Interferogram),
            RasterInput::new(&dem, RasterKind::Dem),
        ])
        .expect("batch should succeed");

    // masking is never skipped by the single-look shortcut
    let ifg_report = find(&prepared, &ifg);
    assert!(!ifg_report.bypassed);
    assert_eq!(ifg_report.stage(), ProcessingStage::Coherence);
    let masked = read_raster(&ifg_report.output);
    assert_eq!(
        masked.item("DATA_TYPE").as_deref(),
        Some("COHERENCE_MASKED_MULTILOOKED_IFG")
    );
    for r in 0..4 {
        assert!(masked.data[[r, 0]].is_nan());
    }
    assert_eq!(masked.data[[0, 1]], 2.0);
    assert_eq!(masked.data[[2, 2]], 23.0); // coherence equal to the threshold is kept

    let dem_report = find(&prepared, &dem);
    assert!(dem_report.bypassed);
    assert_eq!(dem_report.stage(), ProcessingStage::MlookedDem);
    assert_eq!(dem_report.output, dir.path().join("dem_1rlks_4cr.tif"));
    let copied = read_raster(&dem_report.output);
    assert_eq!(copied.data, ramp(4, 4));
    assert_eq!(copied.geotransform, grid(150.0, -33.0));
    assert_eq!(copied.item("DATA_TYPE").as_deref(), Some("MULTILOOKED_DEM"));
    assert_eq!(copied.item("SOURCE").as_deref(), Some("synthetic"));
}

#[test]
fn test_rerun_is_idempotent() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    let ifg = write_raster(
        dir.path(),
        "20150101-20150113_unw.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[("DATA_TYPE", "ORIGINAL_IFG")],
        None,
    );
    let inputs = [RasterInput::new(&ifg, RasterKind::Interferogram)];
    let driver = PrepDriver::new(config(2, CropPolicy::Intersection)).expect("driver");

    let first = driver.run(&inputs).expect("first run");
    let first_data = read_raster(&first[0].output).data;
    let second = driver.run(&inputs).expect("second run");
    assert_eq!(first[0].output, second[0].output);
    assert_eq!(read_raster(&second[0].output).data, first_data);

    // a multilooked raster stays multilooked when prepared again
    let again = PrepDriver::new(config(1, CropPolicy::Unchanged))
        .expect("driver")
        .run(&[RasterInput::new(&first[0].output, RasterKind::Interferogram)])
        .expect("rerun on prepared output");
    assert_eq!(again[0].stage(), ProcessingStage::Multilooked);
    assert_eq!(
        again[0].output,
        dir.path().join("20150101-20150113_unw_2rlks_1cr_1rlks_4cr.tif")
    );
    assert_eq!(
        read_raster(&again[0].output).item("DATA_TYPE").as_deref(),
        Some("MULTILOOKED_IFG")
    );
}

#[test]
fn test_every_failure_is_reported() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    let good = write_raster(
        dir.path(),
        "20150101-20150113_unw.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[("DATA_TYPE", "ORIGINAL_IFG")],
        None,
    );
    let unknown_tag = write_raster(
        dir.path(),
        "20150113-20150125_unw.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[("DATA_TYPE", "SOMETHING_ELSE")],
        None,
    );
    let wrong_family = write_raster(
        dir.path(),
        "dem.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[("DATA_TYPE", "ORIGINAL_IFG")],
        None,
    );

    let driver = PrepDriver::new(config(1, CropPolicy::Intersection)).expect("driver");
    let err = driver
        .run(&[
            RasterInput::new(&good, RasterKind::Interferogram),
            RasterInput::new(&unknown_tag, RasterKind::Interferogram),
            RasterInput::new(&wrong_family, RasterKind::Dem),
        ])
        .expect_err("batch should fail");

    match err {
        PrepError::Batch(batch) => {
            assert_eq!(batch.total, 3);
            assert_eq!(batch.failures.len(), 2);
            let failed: Vec<_> = batch.failures.iter().map(|f| f.path.clone()).collect();
            assert!(failed.contains(&unknown_tag));
            assert!(failed.contains(&wrong_family));
            assert!(batch
                .failures
                .iter()
                .all(|f| matches!(f.error, PrepError::MetadataState(_))));
        }
        other => panic!("expected batch failure, got {}", other),
    }

    // the sibling task still ran to completion
    assert!(dir.path().join("20150101-20150113_unw_1rlks_1cr.tif").exists());
}

#[test]
fn test_missing_input_reported() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    let good = write_raster(
        dir.path(),
        "20150101-20150113_unw.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[],
        None,
    );
    let missing = dir.path().join("20150113-20150125_unw.tif");

    let err = PrepDriver::new(config(2, CropPolicy::Intersection))
        .expect("driver")
        .run(&[
            RasterInput::new(&good, RasterKind::Interferogram),
            RasterInput::new(&missing, RasterKind::Interferogram),
        ])
        .expect_err("batch should fail");

    match err {
        PrepError::Batch(batch) => {
            assert_eq!(batch.total, 2);
            assert_eq!(batch.failures.len(), 1);
            assert_eq!(batch.failures[0].path, missing);
            assert!(matches!(batch.failures[0].error, PrepError::InputNotFound(_)));
        }
        other => panic!("expected batch failure, got {}", other),
    }
}

#[test]
fn test_misaligned_custom_extent() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    let ifg = write_raster(
        dir.path(),
        "20150101-20150113_unw.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[],
        None,
    );

    let config = PrepConfig {
        custom_bounds: CustomBounds::new(150.25, -33.0, 151.5, -34.5),
        ..config(1, CropPolicy::Custom)
    };
    let err = PrepDriver::new(config)
        .expect("driver")
        .run(&[RasterInput::new(&ifg, RasterKind::Interferogram)])
        .expect_err("half-pixel extent should be rejected");

    match err {
        PrepError::GridAlignment { parameter, .. } => assert_eq!(parameter, "x_first"),
        other => panic!("expected grid alignment error, got {}", other),
    }
}

#[test]
fn test_custom_extent_on_whole_steps() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    let ifg = write_raster(
        dir.path(),
        "20150101-20150113_unw.tif",
        &ramp(4, 4),
        grid(150.0, -33.0),
        &[],
        None,
    );

    let config = PrepConfig {
        custom_bounds: CustomBounds::new(150.5, -33.5, 151.5, -34.5),
        ..config(1, CropPolicy::Custom)
    };
    let prepared = PrepDriver::new(config)
        .expect("driver")
        .run(&[RasterInput::new(&ifg, RasterKind::Interferogram)])
        .expect("extent one step inside the grid should be accepted");

    assert_eq!(prepared[0].output, dir.path().join("20150101-20150113_unw_1rlks_3cr.tif"));
    let out = read_raster(&prepared[0].output);
    assert_eq!(out.geotransform, [150.5, 0.5, 0.0, -33.5, 0.0, -0.5]);
    assert_eq!(out.data.dim(), (2, 2));
    assert_eq!(out.data[[0, 0]], 12.0);
    assert_eq!(out.data[[1, 1]], 23.0);
}

#[test]
fn test_unchanged_crop_skips_grid_validation() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    // 150.0 + 3 * 0.1 is not a whole number of 0.1 steps in floating point
    let geotransform = [150.0, 0.1, 0.0, -33.0, 0.0, -0.1];
    let dem = write_raster(dir.path(), "dem.tif", &ramp(3, 3), geotransform, &[], None);
    let inputs = [RasterInput::new(&dem, RasterKind::Dem)];

    let custom = PrepConfig {
        grid_tolerance: 0.0,
        custom_bounds: CustomBounds::new(150.0, -33.0, 150.0 + 3.0 * 0.1, -33.0 + 3.0 * -0.1),
        ..config(1, CropPolicy::Custom)
    };
    let err = PrepDriver::new(custom)
        .expect("driver")
        .run(&inputs)
        .expect_err("zero tolerance rejects the raster's own far edge");
    assert!(matches!(err, PrepError::GridAlignment { .. }));

    let unchanged = PrepConfig {
        grid_tolerance: 0.0,
        ..config(1, CropPolicy::Unchanged)
    };
    let prepared = PrepDriver::new(unchanged)
        .expect("driver")
        .run(&inputs)
        .expect("unchanged crop is never grid-checked");
    assert_eq!(prepared[0].stage(), ProcessingStage::MlookedDem);
}

#[test]
fn test_union_fills_uncovered_cells() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    let a = write_raster(dir.path(), "a_dem.tif", &ramp(4, 4), grid(150.0, -33.0), &[], None);
    let b = write_raster(dir.path(), "b_dem.tif", &ramp(4, 4), grid(151.0, -33.0), &[], None);

    let prepared = PrepDriver::new(config(1, CropPolicy::Union))
        .expect("driver")
        .run(&[
            RasterInput::new(&a, RasterKind::Dem),
            RasterInput::new(&b, RasterKind::Dem),
        ])
        .expect("batch should succeed");

    let report_a = find(&prepared, &a);
    let out_a = read_raster(&report_a.output).data;
    assert_eq!(out_a.dim(), (4, 6));
    assert_eq!(out_a[[0, 0]], 1.0);
    assert_eq!(out_a[[3, 3]], 34.0);
    assert!(out_a[[0, 4]].is_nan());
    assert_abs_diff_eq!(report_a.nan_fraction_mean.unwrap_or_default(), 1.0 / 3.0, epsilon = 1e-9);

    let out_b = read_raster(&find(&prepared, &b).output).data;
    assert!(out_b[[0, 0]].is_nan());
    assert_eq!(out_b[[0, 2]], 1.0);
}

#[test]
fn test_zero_phase_is_missing_only_for_interferograms() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    let mut data = ramp(4, 4);
    data[[0, 0]] = 0.0;
    let ifg = write_raster(dir.path(), "20150101-20150113_unw.tif", &data, grid(150.0, -33.0), &[], None);
    let dem = write_raster(dir.path(), "dem.tif", &data, grid(150.0, -33.0), &[], None);

    let config = PrepConfig {
        nan_threshold: 0.5,
        ..config(2, CropPolicy::Intersection)
    };
    let prepared = PrepDriver::new(config)
        .expect("driver")
        .run(&[
            RasterInput::new(&ifg, RasterKind::Interferogram),
            RasterInput::new(&dem, RasterKind::Dem),
        ])
        .expect("batch should succeed");

    let ifg_out = read_raster(&find(&prepared, &ifg).output).data;
    assert_abs_diff_eq!(ifg_out[[0, 0]], 25.0 / 3.0, epsilon = 1e-5); // (2+11+12)/3
    let dem_out = read_raster(&find(&prepared, &dem).output).data;
    assert_abs_diff_eq!(dem_out[[0, 0]], 6.25, epsilon = 1e-5); // (0+2+11+12)/4
}

#[test]
fn test_legacy_alignment_refills_trailing_column() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");
    let ifg = write_raster(
        dir.path(),
        "20150101-20150113_unw.tif",
        &ramp(3, 5),
        grid(150.0, -33.0),
        &[],
        None,
    );
    let inputs = [RasterInput::new(&ifg, RasterKind::Interferogram)];

    let plain_dir = dir.path().join("plain");
    let plain = PrepDriver::new(PrepConfig {
        output_dir: Some(plain_dir),
        ..config(3, CropPolicy::Unchanged)
    })
    .expect("driver")
    .run(&inputs)
    .expect("plain run");
    let plain_out = read_raster(&plain[0].output).data;
    assert_eq!(plain_out.dim(), (1, 2));
    assert!(plain_out[[0, 1]].is_nan()); // a third of the trailing block lies past the window

    let legacy_dir = dir.path().join("legacy");
    let legacy = PrepDriver::new(PrepConfig {
        output_dir: Some(legacy_dir),
        legacy_alignment: true,
        ..config(3, CropPolicy::Unchanged)
    })
    .expect("driver")
    .run(&inputs)
    .expect("legacy run");
    let legacy_out = read_raster(&legacy[0].output).data;
    assert_eq!(legacy_out.dim(), (1, 2));
    assert_eq!(legacy_out[[0, 1]], 15.0); // source cell (1, 4)
    assert_eq!(legacy_out[[0, 0]], plain_out[[0, 0]]);
}

#[test]
fn test_legacy_alignment_samples_source_beyond_extent() {
    init_logging();
    let dir = TempDir::new().expect("temp dir");

    // A spans 9 columns, B only 7 starting one column later
    let mut wide = ramp(4, 9);
    wide[[3, 8]] = 0.0;
    let a = write_raster(dir.path(), "20150101-20150113_unw.tif", &wide, grid(150.0, -33.0), &[], None);
    let b = write_raster(dir.path(), "20150113-20150125_unw.tif", &ramp(4, 7), grid(150.5, -33.0), &[], None);

    let config = PrepConfig {
        legacy_alignment: true,
        ..config(2, CropPolicy::Intersection)
    };
    let prepared = PrepDriver::new(config)
        .expect("driver")
        .run(&[
            RasterInput::new(&a, RasterKind::Interferogram),
            RasterInput::new(&b, RasterKind::Interferogram),
        ])
        .expect("batch should succeed");

    // the 7 column window averages to 4 columns; legacy tools stop at 3
    let out_a = read_raster(&find(&prepared, &a).output).data;
    assert_eq!(out_a.dim(), (2, 4));
    assert_eq!(out_a[[0, 3]], 19.0); // column 8 of A, past the resolved extent
    assert_eq!(out_a[[1, 3]], 0.0); // zero phase sampled as stored
    assert_abs_diff_eq!(out_a[[0, 0]], 7.5, epsilon = 1e-5); // (2+3+12+13)/4

    let out_b = read_raster(&find(&prepared, &b).output).data;
    assert!(out_b[[0, 3]].is_nan()); // centre lies past the edge of B
}
