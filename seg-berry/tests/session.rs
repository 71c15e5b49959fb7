use ndarray::{s, Array2, Array3, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use seg_berry::prelude::*;
use seg_berry::segment::PeakPolicy;
use seg_berry::{SegmentRegion, SessionState};

fn init_logging() {
    let _ = simple_logger::init_with_level(log::Level::Warn);
}

fn count(mask: impl IntoIterator<Item = u8>) -> usize {
    mask.into_iter().filter(|&v| v > 0).count()
}

fn session_of(data: &Array3<f32>) -> SegmentationSession {
    let mut s = SegmentationSession::default();
    s.load_array(data, [1.0; 3]).unwrap();
    s
}

/// 100x100 的单切片体数据, 中心 20x20 方块为 `square`, 其余为 `background`.
fn square_slice(background: f32, square: f32) -> Array3<f32> {
    let mut data = Array3::<f32>::from_elem((100, 100, 1), background);
    data.slice_mut(s![40..60, 40..60, ..]).fill(square);
    data
}

#[test]
fn test_flat_volume_falls_back() {
    init_logging();
    let mut s = session_of(&Array3::from_elem((20, 20, 20), 10.0));
    assert_eq!(s.current_slice(), 10);

    // (row 9, col 10) -> (10, 10, 10).
    let r = s.segment_at(9, 10, 0.5, SegmentMode::Plane).unwrap();
    assert_eq!(r.seed, (10, 10, 10));
    // 回退路径的警告日志在 threshold 模块的单元测试中检查.
    assert!(r.threshold.is_rough_guess());
    assert!((r.threshold.value - 2.6).abs() < 1e-9);

    // 所有体素都高于回退阈值, 掩码为空, 但轮廓和分割信息照常生成.
    assert_eq!(r.voxels, 0);
    assert_eq!(count(s.mask().unwrap().iter().copied()), 0);
    assert!(count(s.outline().unwrap().iter().copied()) > 0);
    assert_eq!(s.state(), SessionState::Segmented);
    let column = s.info().unwrap().column(10).unwrap().to_vec();
    assert_eq!(column, vec![10.0, 10.0, 0.2, 0.2, 0.5]);
}

#[test]
fn test_zero_volume_fills_box() {
    init_logging();
    let mut s = session_of(&Array3::zeros((20, 20, 20)));
    let r = s.segment_at(9, 10, 0.5, SegmentMode::Plane).unwrap();
    assert!(r.threshold.is_rough_guess());

    let SegmentRegion::Plane(bbox) = r.region else {
        panic!("expected a plane region");
    };
    assert_eq!(bbox.lo(), [8, 8]);
    assert_eq!(bbox.hi(), [11, 11]);

    // 掩码恰好是当前切片上的 (已裁剪) 包围盒.
    let mask = s.mask().unwrap();
    for ((a, b, c), &v) in mask.indexed_iter() {
        let expected = c == 10 && (8usize..=11).contains(&a) && (8usize..=11).contains(&b);
        assert_eq!(v == 1, expected, "({a}, {b}, {c})");
    }
    assert_eq!(r.voxels, 16);
}

#[test]
fn test_bimodal_slice() {
    init_logging();
    let mut s = session_of(&square_slice(0.0, 200.0));
    s.set_box_fractions(0.5, 0.5);

    // (row 49, col 50) -> (50, 50).
    let r = s.segment_at(49, 50, 0.5, SegmentMode::Plane).unwrap();
    assert_eq!(r.seed, (50, 50, 0));
    assert_eq!(r.threshold.policy, PeakPolicy::Pair);
    assert_eq!(r.threshold.peaks.len(), 2);
    assert!((r.threshold.value - 98.0).abs() < 1e-9);
    assert!((r.threshold.value - 100.0).abs() <= 2.0);

    // 生长区间为 [0, 98], 明亮方块里的种子不被接受.
    assert_eq!(r.voxels, 0);
}

#[test]
fn test_bimodal_slice_dark_square() {
    init_logging();
    let mut s = session_of(&square_slice(200.0, 0.0));
    s.set_box_fractions(0.5, 0.5);
    let r = s.segment_at(49, 50, 0.5, SegmentMode::Plane).unwrap();
    assert_eq!(r.threshold.policy, PeakPolicy::Pair);
    assert!((r.threshold.value - 98.0).abs() < 1e-9);

    let mask = s.mask().unwrap();
    let plane = mask.slice(s![.., .., 0]);
    // 开运算只会削掉方块的角.
    assert!((396usize..=400).contains(&r.voxels), "{}", r.voxels);
    for ((w, h), &v) in plane.indexed_iter() {
        if v > 0 {
            assert!((40usize..60).contains(&w) && (40usize..60).contains(&h), "({w}, {h})");
        }
    }
    assert!(plane.slice(s![41..59, 41..59]).iter().all(|&v| v == 1));
}

#[test]
fn test_edge_clamped_volume_box() {
    init_logging();
    let data = Array3::<f32>::from_shape_fn((30, 30, 30), |(a, b, c)| ((a * 3 + b * 5 + c) % 17) as f32);
    let mut s = session_of(&data);
    s.set_box_fractions(0.2, 0.2);
    assert!(s.set_slice(0));

    // 第 29 行对应高轴索引 0.
    let r = s.segment_at(29, 0, 0.5, SegmentMode::Volume).unwrap();
    assert_eq!(r.seed, (0, 0, 0));
    let SegmentRegion::Volume(bbox) = r.region else {
        panic!("expected a volume region");
    };
    assert_eq!(bbox.lo(), [0, 0, 0]);
    assert_eq!(bbox.hi(), [2, 2, 2]);

    for ((a, b, c), &v) in s.mask().unwrap().indexed_iter() {
        if v > 0 {
            assert!(bbox.contains(&[a, b, c]));
        }
    }
    for ((a, b, c), &v) in s.outline().unwrap().indexed_iter() {
        if v > 0 {
            assert!(bbox.contains(&[a, b, c]));
        }
    }
}

#[test]
fn test_resegmentation_is_idempotent() {
    init_logging();
    let data = Array3::<f32>::from_shape_fn((24, 24, 24), |(a, b, c)| {
        let d = (a as f32 - 12.0).powi(2) + (b as f32 - 12.0).powi(2) + (c as f32 - 12.0).powi(2);
        if d < 36.0 {
            20.0
        } else {
            150.0 + ((a + b + c) % 7) as f32
        }
    });

    for mode in [SegmentMode::Plane, SegmentMode::Volume] {
        let mut s = session_of(&data);
        s.set_box_fractions(0.6, 0.6);
        let first = s.segment_at(11, 12, 0.5, mode).unwrap();
        let mask1 = s.mask().unwrap().to_owned();
        let display1 = s.display().unwrap().to_owned();

        // 第二次读取的是原始数据, 而不是已被高亮的可视化副本.
        let second = s.segment_at(11, 12, 0.5, mode).unwrap();
        assert_eq!(first, second);
        assert_eq!(s.mask().unwrap(), mask1);
        assert_eq!(s.display().unwrap(), display1);
        assert!(first.voxels > 0, "{mode:?}");
    }
}

#[test]
fn test_volume_mode_replaces_and_accumulate_merges() {
    init_logging();
    let mut s = session_of(&Array3::zeros((20, 20, 20)));
    s.set_box_fractions(0.2, 0.2);

    s.segment_at(2, 3, 0.5, SegmentMode::Plane).unwrap();
    assert_eq!(s.info().unwrap().recorded_slices(), vec![10]);

    // 3D 分割替换整个掩码并重置分割信息.
    assert!(s.set_slice(5));
    let r = s.segment_at(9, 10, 0.5, SegmentMode::Volume).unwrap();
    assert_eq!(count(s.mask().unwrap().iter().copied()), r.voxels);
    assert_eq!(s.info().unwrap().recorded_slices(), vec![5]);

    // 叠加方式的 2D 分割保留已有结果.
    let req = SegmentRequest::new(2, 3).with_accumulate(true);
    let r2 = s.segment(req).unwrap();
    let total = count(s.mask().unwrap().iter().copied());
    assert!(total > r.voxels);
    assert!(total <= r.voxels + r2.voxels);
    assert_eq!(s.info().unwrap().recorded_slices(), vec![5]);

    // 不叠加的 2D 分割只清空当前切片.
    assert!(s.set_slice(6));
    let r3 = s.segment_at(2, 3, 0.5, SegmentMode::Plane).unwrap();
    let mask = s.mask().unwrap();
    assert_eq!(count(mask.slice(s![.., .., 6]).iter().copied()), r3.voxels);
    assert!(count(mask.slice(s![.., .., 5]).iter().copied()) > 0);
}

#[test]
fn test_orientation_axis_mapping_pinned() {
    init_logging();
    let dims = (20, 24, 28);
    let expected = [
        (Orientation::Xy, 14, (4, 20, 14)),
        (Orientation::Xz, 12, (4, 12, 24)),
        (Orientation::Yz, 10, (10, 4, 24)),
    ];
    for (orientation, mid, seed) in expected {
        for mode in [SegmentMode::Plane, SegmentMode::Volume] {
            let mut s = session_of(&Array3::zeros(dims));
            s.set_orientation(orientation);
            s.set_box_fractions(0.2, 0.3);
            assert_eq!(s.current_slice(), mid);

            let r = s.segment_at(3, 4, 0.5, mode).unwrap();
            assert_eq!(r.seed, seed, "{orientation:?} {mode:?}");

            let slice_axis = orientation.slice_axis();
            let (w_axis, h_axis) = orientation.in_plane_axes();
            let mask = s.mask().unwrap();
            match r.region {
                SegmentRegion::Plane(b) => {
                    assert_eq!(mode, SegmentMode::Plane);
                    // 全零数据上掩码恰好是包围盒.
                    assert_eq!(r.voxels, b.volume());
                    for (idx, &v) in mask.indexed_iter() {
                        let idx = [idx.0, idx.1, idx.2];
                        let inside = idx[slice_axis] == mid && b.contains(&[idx[w_axis], idx[h_axis]]);
                        assert_eq!(v == 1, inside, "{orientation:?} {idx:?}");
                    }
                }
                SegmentRegion::Volume(b) => {
                    assert_eq!(mode, SegmentMode::Volume);
                    assert_eq!(r.voxels, b.volume());
                    // 穿过平面比例作用在切片轴上.
                    let full = [dims.0, dims.1, dims.2];
                    for axis in 0..3 {
                        let f = if axis == slice_axis { 0.3 } else { 0.2 };
                        let size = (f * full[axis] as f64).round_ties_even() as usize;
                        assert!(b.extent()[axis] <= size, "{orientation:?} axis {axis}");
                    }
                    for (idx, &v) in mask.indexed_iter() {
                        assert_eq!(v == 1, b.contains(&[idx.0, idx.1, idx.2]));
                    }
                }
            }
        }
    }
}

#[test]
fn test_invalid_orientation_falls_back() {
    init_logging();
    let mut s = session_of(&Array3::zeros((5, 7, 9)));
    s.set_orientation_code(2);
    assert_eq!(s.orientation(), Orientation::Xz);
    s.set_orientation_code(17);
    assert_eq!(s.orientation(), Orientation::Yz);
    assert_eq!((s.width(), s.height(), s.slice_count()), (7, 9, 5));
    assert_eq!(s.current_slice(), 2);
    assert_eq!(s.slice_bounds(), Some((0, 4)));
}

#[test]
fn test_empty_session_queries() {
    init_logging();
    let mut s = SegmentationSession::default();
    assert_eq!(s.state(), SessionState::Empty);
    assert_eq!((s.width(), s.height(), s.slice_count()), (0, 0, 0));
    assert_eq!(s.slice_bounds(), None);
    assert!(!s.set_slice(0));
    s.set_orientation_code(3);
    assert_eq!(s.current_slice(), 0);
    assert!(s.mask().is_none());
    assert!(s.display_slice().is_none());
    assert!(s.segment_at(0, 0, 0.5, SegmentMode::Volume).is_none());

    let dir = tempfile::tempdir().unwrap();
    assert_eq!(s.write_outputs(dir.path().join("none")).unwrap(), None);
    assert!(!s.save_slice_preview(dir.path().join("none.png")).unwrap());
}

#[test]
fn test_invalid_volume_rejected() {
    let mut s = SegmentationSession::default();
    let flat = Array2::<f32>::zeros((8, 8));
    assert!(matches!(s.load_array(&flat, [1.0; 3]), Err(VolumeError::InvalidVolume(_))));
    assert_eq!(s.state(), SessionState::Empty);
}

#[test]
fn test_write_outputs_round_trip() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("case").join("out");

    let data = Array3::<f32>::from_shape_fn((16, 18, 20), |(a, b, c)| ((a + 2 * b + 3 * c) % 9) as f32);
    let mut s = session_of(&data);

    // 尚未分割时什么也不写.
    assert_eq!(s.write_outputs(&prefix).unwrap(), None);

    s.set_box_fractions(0.5, 0.5);
    s.segment_at(4, 5, 0.8, SegmentMode::Volume).unwrap();
    let paths = s.write_outputs(&prefix).unwrap().unwrap();
    assert!(paths.mask.ends_with("out_seg.nii"));
    assert!(paths.outline.ends_with("out_segBox.nii"));
    assert!(paths.info.ends_with("out_segInfo.npy"));

    let info: Array2<f64> = ndarray_npy::read_npy(&paths.info).unwrap();
    assert_eq!(info.dim(), (5, 20));
    assert_eq!(info, s.info().unwrap().data());

    let mask = ReaderOptions::new()
        .read_file(&paths.mask)
        .unwrap()
        .into_volume()
        .into_ndarray::<u8>()
        .unwrap()
        .into_dimensionality::<Ix3>()
        .unwrap();
    assert_eq!(mask, s.mask().unwrap());

    let outline = Volume::open(&paths.outline).unwrap();
    assert_eq!(outline.shape(), (16, 18, 20));
    assert_eq!(outline.spacing(), [1.0, 1.0, 1.0]);
    let expected = s.outline().unwrap().mapv(f32::from);
    assert_eq!(outline.data(), expected);

    let png = dir.path().join("preview.png");
    assert!(s.save_slice_preview(&png).unwrap());
    let img = image::open(&png).unwrap().into_luma8();
    assert_eq!(img.dimensions(), (16, 18));
}
