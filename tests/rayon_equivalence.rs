#![cfg(feature = "rayon")]

use surfmatch::{find_match_with_config, ImageView, MatchConfig};

fn make_texture(width: usize, height: usize) -> Vec<u8> {
    let mut data = vec![128u8; width * height];
    for &(cx, cy, r, v) in [
        (20.0f32, 18.0f32, 5.0f32, 30u8),
        (52.0, 22.0, 7.0, 220),
        (33.0, 47.0, 4.0, 60),
        (70.0, 58.0, 6.0, 200),
        (15.0, 70.0, 8.0, 40),
        (58.0, 80.0, 3.5, 240),
    ]
    .iter()
    {
        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r * r {
                    data[y * width + x] = v;
                }
            }
        }
    }
    data
}

#[test]
fn parallel_matches_sequential() {
    let tpl_width = 96;
    let tpl_height = 96;
    let model = make_texture(tpl_width, tpl_height);

    let img_width = 224;
    let img_height = 192;
    let x0 = 64;
    let y0 = 32;
    let mut image = vec![128u8; img_width * img_height];
    for y in 0..tpl_height {
        let dst = (y0 + y) * img_width + x0;
        image[dst..dst + tpl_width].copy_from_slice(&model[y * tpl_width..(y + 1) * tpl_width]);
    }

    let model_view = ImageView::from_slice(&model, tpl_width, tpl_height).unwrap();
    let image_view = ImageView::from_slice(&image, img_width, img_height).unwrap();

    let seq = find_match_with_config(model_view, image_view, MatchConfig::default()).unwrap();
    let par = find_match_with_config(
        model_view,
        image_view,
        MatchConfig {
            parallel: true,
            ..MatchConfig::default()
        },
    )
    .unwrap();

    assert_eq!(seq.model_keypoints, par.model_keypoints);
    assert_eq!(seq.observed_keypoints, par.observed_keypoints);
    assert_eq!(seq.matches, par.matches);
    assert_eq!(seq.mask, par.mask);
    assert_eq!(
        seq.homography.map(|h| *h.matrix()),
        par.homography.map(|h| *h.matrix())
    );
}
