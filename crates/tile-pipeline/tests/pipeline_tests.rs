//! End-to-end tests for tiles, statistics, histograms and profiles.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cube_common::{
    AxisSlice, CompressionType, DataCube, ImageBounds, PipelineError, PipelineResult,
    RasterTileMessage, RegionHistogramMessage, IMAGE_REGION_ID,
};
use intensity_cache::IntensityCache;
use tile_pipeline::codec::{CodecError, CodecResult};
use tile_pipeline::compress::{decode_raw, SUBSET_FAILED};
use tile_pipeline::nan_encoding::apply_mask;
use tile_pipeline::{
    default_display_axes, downsample, nan_runs, region_histogram, resolve_hyperslab, BlockCodec,
    CompressionSettings, CubeViewer, ExactPercentiles, FrameRequest, HistogramTarget,
    RasterRequest, RasterTileBuilder, StatisticsEngine, TileCompressor, UnitConversion, ZfpCodec,
};
use test_utils::{
    assert_approx_eq, assert_float_slice_eq, create_constant_plane, create_noise_plane,
    create_plane_with_nans, create_source_plane, create_spectral_cube, create_test_cube,
    create_test_plane, finite_mean, percentiles, plane_cube, shapes, test_cube_value, FailingCube,
};

/// One cube with the stages pointed at its spatial axes.
struct Served {
    cube: Arc<dyn DataCube>,
    axes: (usize, usize),
    builder: RasterTileBuilder,
}

fn serve(cube: impl DataCube + 'static, engine: StatisticsEngine) -> Served {
    serve_with(cube, engine, TileCompressor::default())
}

fn serve_with(cube: impl DataCube + 'static, engine: StatisticsEngine, compressor: TileCompressor) -> Served {
    let axes = default_display_axes(cube.axis_roles());
    Served {
        cube: Arc::new(cube),
        axes,
        builder: RasterTileBuilder::new(engine, compressor, 64),
    }
}

impl Served {
    fn raster_tile(
        &self,
        request: &RasterRequest,
        conversion: Option<&UnitConversion>,
        frame_changed: &mut bool,
    ) -> PipelineResult<RasterTileMessage> {
        self.builder
            .build(self.cube.as_ref(), self.axes, request, conversion, frame_changed)
    }

    fn percentile_intensities(
        &self,
        frames: &FrameRequest,
        conversion: Option<&UnitConversion>,
        wanted: &[f64],
    ) -> PipelineResult<Vec<f64>> {
        self.builder
            .engine()
            .percentile_intensities(self.cube.as_ref(), self.axes, frames, conversion, wanted)
    }

    fn min_max(&self, frames: &FrameRequest, conversion: Option<&UnitConversion>) -> PipelineResult<(f64, f64)> {
        self.builder
            .engine()
            .min_max(self.cube.as_ref(), self.axes, frames, conversion)
    }

    fn region_histogram(
        &self,
        file_id: i32,
        frames: &FrameRequest,
        conversion: Option<&UnitConversion>,
    ) -> PipelineResult<RegionHistogramMessage> {
        let target = HistogramTarget {
            file_id,
            region_id: IMAGE_REGION_ID,
            polarization: frames.polarization as i32,
            channel: frames.channel_low as i32,
        };
        region_histogram(
            self.builder.engine(),
            self.cube.as_ref(),
            self.axes,
            frames,
            conversion,
            self.builder.histogram_bins(),
            target,
        )
    }
}

/// Zfp, except that any band holding [`Self::POISON`] fails to encode.
struct PoisonedCodec;

impl PoisonedCodec {
    const POISON: f32 = -9999.0;
}

impl BlockCodec for PoisonedCodec {
    fn name(&self) -> &'static str {
        "poisoned"
    }

    fn compress(&self, data: &[f32], width: usize, height: usize, precision: u32) -> CodecResult<Vec<u8>> {
        if data.contains(&Self::POISON) {
            return Err(CodecError::corrupt("poisoned band"));
        }
        ZfpCodec.compress(data, width, height, precision)
    }

    fn decompress(&self, bytes: &[u8]) -> CodecResult<(Vec<f32>, usize, usize)> {
        ZfpCodec.decompress(bytes)
    }
}

fn raster(bounds: ImageBounds, mip: i64, settings: CompressionSettings) -> RasterRequest {
    RasterRequest {
        file_id: 0,
        bounds,
        mip,
        channel: 0,
        polarization: 0,
        settings,
    }
}

#[test]
fn test_free_dims_full_and_fixed_dims_single() {
    let cube = create_test_cube("dims", 10, 6, 5, 4);
    let frames = FrameRequest::channel(3, 2);
    let slab = resolve_hyperslab(cube.shape(), (3, 2), &frames.plane_selections(cube.axis_roles())).unwrap();
    assert_eq!(slab.counts(), vec![1, 1, 6, 10]);

    let range = FrameRequest {
        channel_low: 1,
        channel_high: 3,
        polarization: 2,
    };
    let slab = resolve_hyperslab(cube.shape(), (3, 2), &range.range_selections(cube.axis_roles())).unwrap();
    assert_eq!(slab.slices[1], AxisSlice::new(1, 3));
    assert_eq!(slab.counts(), vec![1, 3, 6, 10]);
}

#[test]
fn test_ten_by_ten_mip_two() {
    let values = create_noise_plane(10, 10, -5.0, 5.0, 42);
    let p = serve(plane_cube("ten", 10, 10, values.clone()), StatisticsEngine::default());
    let mut changed = false;
    let tile = p
        .raster_tile(
            &raster(ImageBounds::full(10, 10), 2, CompressionSettings::uncompressed()),
            None,
            &mut changed,
        )
        .unwrap();
    assert_eq!((tile.width, tile.height), (5, 5));

    let out = decode_raw(&tile.subsets[0].compressed);
    for by in 0..5 {
        for bx in 0..5 {
            let block = [
                values[(2 * by) * 10 + 2 * bx],
                values[(2 * by) * 10 + 2 * bx + 1],
                values[(2 * by + 1) * 10 + 2 * bx],
                values[(2 * by + 1) * 10 + 2 * bx + 1],
            ];
            assert_approx_eq!(out[by * 5 + bx], finite_mean(&block), 1e-6);
        }
    }
}

#[test]
fn test_mip_larger_than_image_gives_no_result() {
    let p = serve(plane_cube("small", 6, 10, create_test_plane(6, 10)), StatisticsEngine::default());
    let mut changed = false;
    let err = p
        .raster_tile(
            &raster(ImageBounds::full(6, 10), 7, CompressionSettings::uncompressed()),
            None,
            &mut changed,
        )
        .unwrap_err();
    assert!(err.is_no_result());
}

#[test]
fn test_mip_one_identity_keeps_nan() {
    let values = create_plane_with_nans(7, 5, &[(0, 0), (3, 2), (6, 4)]);
    let p = serve(plane_cube("id", 7, 5, values.clone()), StatisticsEngine::default());
    let mut changed = false;
    let tile = p
        .raster_tile(
            &raster(ImageBounds::full(7, 5), 1, CompressionSettings::uncompressed()),
            None,
            &mut changed,
        )
        .unwrap();
    assert_float_slice_eq!(decode_raw(&tile.subsets[0].compressed), values, 0.0);
}

#[test]
fn test_sub_region_tile() {
    let values = create_test_plane(20, 12);
    let p = serve(plane_cube("region", 20, 12, values.clone()), StatisticsEngine::default());
    let mut changed = false;
    let bounds = ImageBounds::new(4, 16, 2, 10);
    let tile = p
        .raster_tile(&raster(bounds, 4, CompressionSettings::uncompressed()), None, &mut changed)
        .unwrap();
    assert_eq!((tile.width, tile.height), (3, 2));

    let region: Vec<f32> = (2..10).flat_map(|y| values[y * 20 + 4..y * 20 + 16].to_vec()).collect();
    let (expected, _, _) = downsample(&region, 12, 8, 4);
    assert_float_slice_eq!(decode_raw(&tile.subsets[0].compressed), expected, 1e-3);
}

#[test]
fn test_compressed_tile_roundtrip_with_nan_mask() {
    let mut values = create_noise_plane(40, 33, 0.0, 50.0, 9);
    for i in (0..values.len()).step_by(37) {
        values[i] = f32::NAN;
    }
    let p = serve(plane_cube("zfp", 40, 33, values.clone()), StatisticsEngine::default());
    let mut changed = false;
    let tile = p
        .raster_tile(
            &raster(ImageBounds::full(40, 33), 1, CompressionSettings::zfp(24, 4)),
            None,
            &mut changed,
        )
        .unwrap();
    assert_eq!(tile.compression_type, CompressionType::Zfp);
    assert_eq!(tile.subsets.len(), 4);
    assert_eq!(tile.subsets.iter().map(|s| s.rows).collect::<Vec<_>>(), vec![8, 8, 8, 9]);
    assert_eq!(tile.failed_subsets(), 0);

    let mut decoded = Vec::new();
    for subset in &tile.subsets {
        let (mut band, width, rows) = ZfpCodec.decompress(&subset.compressed).unwrap();
        assert_eq!((width, rows), (40, subset.rows));
        apply_mask(&mut band, &subset.nan_runs);
        decoded.extend(band);
    }
    assert_float_slice_eq!(decoded, values, 1e-2);
}

#[test]
fn test_subset_failure_isolated_per_subset() {
    let p = serve(plane_cube("bad", 16, 16, create_test_plane(16, 16)), StatisticsEngine::default());
    let mut changed = false;
    let tile = p
        .raster_tile(
            &raster(ImageBounds::full(16, 16), 1, CompressionSettings::zfp(40, 2)),
            None,
            &mut changed,
        )
        .unwrap();
    assert_eq!(tile.subsets.len(), 2);
    assert_eq!(tile.failed_subsets(), 2);
    // NaN runs still describe each band
    assert!(tile.subsets.iter().all(|s| s.nan_runs == vec![128]));
}

#[test]
fn test_one_failed_subset_leaves_siblings_intact() {
    let mut values = create_test_plane(16, 16);
    // row 9 falls in the third of four 4-row bands
    values[9 * 16 + 3] = PoisonedCodec::POISON;
    let p = serve_with(
        plane_cube("poison", 16, 16, values),
        StatisticsEngine::default(),
        TileCompressor::new(Arc::new(PoisonedCodec)),
    );
    let mut changed = false;
    let tile = p
        .raster_tile(
            &raster(ImageBounds::full(16, 16), 1, CompressionSettings::zfp(24, 4)),
            None,
            &mut changed,
        )
        .unwrap();

    assert_eq!(tile.subsets.len(), 4);
    assert_eq!(tile.failed_subsets(), 1);
    assert_eq!(tile.subsets[2].status, SUBSET_FAILED);
    assert!(tile.subsets[2].compressed.is_empty());
    assert_eq!(tile.subsets[2].nan_runs, vec![64]);

    for (index, subset) in tile.subsets.iter().enumerate().filter(|(i, _)| *i != 2) {
        assert_eq!(subset.status, 0);
        assert!(!subset.compressed.is_empty());
        let (band, width, rows) = ZfpCodec.decompress(&subset.compressed).unwrap();
        assert_eq!((width, rows), (16, 4));
        // bands stay in row order
        assert_approx_eq!(band[0], (index * 4) as f32, 0.5);
    }
}

#[test]
fn test_single_subset_matches_uncompressed_shape() {
    let values = create_noise_plane(12, 12, 0.0, 1.0, 3);
    let p = serve(plane_cube("shape", 12, 12, values), StatisticsEngine::default());
    let mut changed = false;
    let raw = p
        .raster_tile(&raster(ImageBounds::full(12, 12), 2, CompressionSettings::uncompressed()), None, &mut changed)
        .unwrap();
    let zfp = p
        .raster_tile(&raster(ImageBounds::full(12, 12), 2, CompressionSettings::zfp(16, 1)), None, &mut changed)
        .unwrap();
    assert_eq!(raw.subsets.len(), zfp.subsets.len());
    assert_eq!((raw.width, raw.height), (zfp.width, zfp.height));
    assert_eq!(raw.subsets[0].rows, zfp.subsets[0].rows);
    assert_ne!(raw.compression_type, zfp.compression_type);
}

#[test]
fn test_percentile_extremes_equal_min_max() {
    let values = create_plane_with_nans(30, 20, &[(0, 0), (5, 5), (29, 19)]);
    let finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let min = finite.iter().copied().fold(f32::INFINITY, f32::min);
    let max = finite.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let p = serve(plane_cube("ext", 30, 20, values), StatisticsEngine::default());
    let got = p
        .percentile_intensities(&FrameRequest::channel(0, 0), None, &percentiles::MIN_MAX)
        .unwrap();
    assert_eq!(got, vec![f64::from(min), f64::from(max)]);
}

#[test]
fn test_histogram_counts_equal_finite_count() {
    let values = create_plane_with_nans(25, 25, &[(1, 1), (2, 2), (3, 3), (24, 24)]);
    let finite = values.iter().filter(|v| v.is_finite()).count() as u64;
    let p = serve(plane_cube("hist", 25, 25, values), StatisticsEngine::default());

    let histogram = p.region_histogram(5, &FrameRequest::channel(0, 0), None).unwrap();
    assert_eq!(histogram.total(), finite);
    assert_eq!(histogram.region_id, IMAGE_REGION_ID);
    assert_eq!(histogram.file_id, 5);
    assert_eq!(histogram.bin_count, 64);
}

#[test]
fn test_polarization_selects_frame() {
    let cube = create_test_cube("stokes", 6, 4, 3, 4);
    let p = serve(cube, StatisticsEngine::default());
    let (min, max) = p.min_max(&FrameRequest::channel(2, 3), None).unwrap();
    assert_eq!(min, f64::from(test_cube_value(3, 2, 0, 0)));
    assert_eq!(max, f64::from(test_cube_value(3, 2, 3, 5)));

    // out-of-range polarization widens to every polarization
    let (min, max) = p.min_max(&FrameRequest::channel(2, 9), None).unwrap();
    assert_eq!(min, f64::from(test_cube_value(0, 2, 0, 0)));
    assert_eq!(max, f64::from(test_cube_value(3, 2, 3, 5)));
}

#[test]
fn test_unavailable_view_is_reported() {
    let cube = FailingCube::new("offline.fits", 8, 8, 2);
    let engine = StatisticsEngine::default();
    let err = engine
        .min_max(&cube, (2, 1), &FrameRequest::channel(0, 0), None)
        .unwrap_err();
    assert!(matches!(err, PipelineError::DataUnavailable(_)));
    assert_eq!(cube.reads(), 1);
}

#[test]
fn test_cached_statistics_skip_the_read() {
    let cache = IntensityCache::in_memory(1024);
    let engine = StatisticsEngine::new(Arc::new(ExactPercentiles), cache.clone());
    let live = create_spectral_cube("cube.fits", 16, 16, 3);
    let first = engine
        .percentile_intensities(&live, (2, 1), &FrameRequest::channel(1, 0), None, &percentiles::CLIP_LEVELS)
        .unwrap();

    // same source id, data now unreachable: everything must come from cache
    let offline = FailingCube::new("cube.fits", 16, 16, 3);
    let second = engine
        .percentile_intensities(&offline, (2, 1), &FrameRequest::channel(1, 0), None, &percentiles::CLIP_LEVELS)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(offline.reads(), 0);
    assert_eq!(cache.stats().hits.load(Ordering::Relaxed), percentiles::CLIP_LEVELS.len() as u64);
}

#[test]
fn test_spectral_profile_through_viewer() {
    let mut viewer = CubeViewer::with_parts(
        StatisticsEngine::default(),
        TileCompressor::default(),
        16,
        CompressionSettings::uncompressed(),
    );
    viewer.open_image(0, Arc::new(create_test_cube("z", 5, 5, 6, 2))).unwrap();
    viewer.set_channel(0, 0, 1).unwrap();

    let (spatial, spectral) = viewer.set_cursor(0, 4, 2).unwrap();
    assert_eq!(spatial.value, test_cube_value(1, 0, 2, 4));
    let z = spectral.expect("cube has six channels");
    assert_eq!(z.profiles[0].len(), 6);
    assert_eq!(z.profiles[0].values[5], test_cube_value(1, 5, 2, 4));
    assert_eq!(z.polarization, 1);
}

#[test]
fn test_nan_runs_for_single_leading_nan() {
    let mut data = vec![0.5f32; 100];
    data[0] = f32::NAN;
    assert_eq!(nan_runs(&data), vec![0, 1, 99]);
}

#[test]
fn test_constant_plane_percentiles_collapse() {
    let p = serve(
        plane_cube("flat", 12, 9, create_constant_plane(12, 9, 2.5)),
        StatisticsEngine::default(),
    );
    let got = p
        .percentile_intensities(&FrameRequest::channel(0, 0), None, &percentiles::SYMMETRIC)
        .unwrap();
    assert!(got.iter().all(|v| *v == 2.5));
}

#[test]
fn test_source_plane_percentiles_are_ordered() {
    let p = serve(
        plane_cube("src", 32, 32, create_source_plane(32, 32, 4.0)),
        StatisticsEngine::default(),
    );
    let got = p
        .percentile_intensities(&FrameRequest::channel(0, 0), None, &percentiles::SYMMETRIC)
        .unwrap();
    assert!(got.windows(2).all(|w| w[0] <= w[1]));
    assert!(got[4] > got[0]);
}

#[test]
fn test_non_square_cube_drops_partial_blocks() {
    let (width, height, channels, pols) = shapes::SMALL;
    let p = serve(
        create_test_cube("small", width, height, channels, pols),
        StatisticsEngine::default(),
    );
    let mut changed = false;
    let tile = p
        .raster_tile(
            &RasterRequest {
                channel: 4,
                ..raster(ImageBounds::full(width, height), 2, CompressionSettings::uncompressed())
            },
            None,
            &mut changed,
        )
        .unwrap();
    assert_eq!((tile.width, tile.height), (width / 2, height / 2));

    let values = decode_raw(&tile.subsets[0].compressed);
    let block = [
        test_cube_value(0, 4, 0, 0),
        test_cube_value(0, 4, 0, 1),
        test_cube_value(0, 4, 1, 0),
        test_cube_value(0, 4, 1, 1),
    ];
    assert_approx_eq!(values[0], block.iter().sum::<f32>() / 4.0, 1e-3);
}
