use approx::assert_abs_diff_eq;
use georef::{GeorefConfig, Georeferencer, MatcherStrategy, SidecarRecord, SidecarStore};
use georef_core::{BoundingBox, GeoRaster, GeoTransform, RgbImage};

fn textured(w: usize, h: usize) -> RgbImage {
    let mut img = RgbImage::zeroed(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = (((x / 11) * 47 + (y / 13) * 29 + (x * y / 83)) % 255) as u8;
            img.set(x, y, [v, v, v]);
        }
    }
    img
}

fn reference_from(pixels: RgbImage) -> GeoRaster {
    let transform = GeoTransform {
        origin_lon: -90.10,
        origin_lat: 35.00,
        px_size_lon: 1e-5,
        px_size_lat: -1e-5,
    };
    let east = transform.origin_lon + pixels.width as f64 * transform.px_size_lon;
    let south = transform.origin_lat + pixels.height as f64 * transform.px_size_lat;
    GeoRaster {
        bounds: BoundingBox::new(transform.origin_lat, south, east, transform.origin_lon),
        pixels,
        transform,
    }
}

/// Classical matching of a photo against reference imagery of the same
/// scene, then fit and warp, end to end.
#[test]
fn classical_pipeline_georeferences_a_matching_scene() {
    let source = textured(320, 256);
    let reference = reference_from(source.clone());

    let config = GeorefConfig {
        strategy: MatcherStrategy::Classical,
        ..GeorefConfig::default()
    };
    let runner = Georeferencer::new(config);

    let set = runner
        .match_reference(&source, &reference)
        .expect("matching");
    assert!(set.gcps.len() >= 5, "got {} gcps", set.gcps.len());
    assert!((0.0..=1.0).contains(&set.confidence));

    let artifact = runner.georeference(&source, &set.gcps).expect("fit");
    // Identity scene: the fitted transform should land within a few meters.
    assert!(
        artifact.residuals.rms_m < 30.0,
        "rms {} m",
        artifact.residuals.rms_m
    );
    assert!(artifact.warped.warped);
    let b = artifact.fitted.bounds;
    assert!(b.north > b.south && b.east > b.west);
    // The fitted extent stays in the neighborhood of the reference box.
    assert_abs_diff_eq!(b.north, 35.00, epsilon = 0.01);
    assert_abs_diff_eq!(b.west, -90.10, epsilon = 0.01);
}

#[test]
fn artifact_round_trips_through_the_sidecar_store() {
    let source = textured(320, 256);
    let reference = reference_from(source.clone());
    let runner = Georeferencer::new(GeorefConfig {
        strategy: MatcherStrategy::Classical,
        ..GeorefConfig::default()
    });

    let set = runner
        .match_reference(&source, &reference)
        .expect("matching");
    let artifact = runner.georeference(&source, &set.gcps).expect("fit");

    let dir = tempfile::tempdir().expect("tempdir");
    let store = SidecarStore::open(dir.path()).expect("open");
    let record = SidecarRecord::from_artifact(&artifact, &set.gcps);
    store.save("scan-42", &record).expect("save");

    let loaded = store.load("scan-42").expect("load").expect("present");
    assert_eq!(loaded, record);
    assert_eq!(loaded.transform.affine, artifact.fitted.affine);
    assert_eq!(loaded.gcps.len(), set.gcps.len());
}
