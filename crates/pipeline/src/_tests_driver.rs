#![cfg(test)]

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::driver;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("circ2d-driver-{tag}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_constant_f64(path: &PathBuf, value: f64, count: usize) {
    let mut file = fs::File::create(path).unwrap();
    for _ in 0..count {
        file.write_all(&value.to_ne_bytes()).unwrap();
    }
}

#[test]
fn uniform_psi_yields_zero_circulation_statistics() {
    let dir = scratch_dir("uniform");
    let points = 16 * 16;
    write_constant_f64(&dir.join("ReaPsi.000.dat"), 1.0, points);
    write_constant_f64(&dir.join("ImaPsi.000.dat"), 0.0, points);
    let out_path = dir.join("circulation.json");

    let content = format!(
        r#"
[fields]
directory = "{dir}"
resolution = [16, 16]
xi = 0.05
timesteps = [0]

[pipeline]
threads = 2

[circulation]
loop_sizes = [3, 4]
quantities = ["velocity", "momentum"]

[circulation.moments]
p_max = 2
absolute = true

# odd bin count keeps zero away from any edge
[circulation.histogram]
bins = 5
max = 1.0

[output]
path = "{out}"
"#,
        dir = dir.display(),
        out = out_path.display()
    );

    let config = PipelineConfig::from_str(&content).unwrap();
    let report = driver::run(&config).unwrap();
    assert_eq!(report.slices, 1);

    let raw = fs::read_to_string(&out_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert!(value["SimParams"]["kappa"].as_f64().unwrap() > 0.0);
    assert_eq!(value["SimParams"]["N"][0].as_u64(), Some(16));

    for quantity in ["Velocity", "Momentum"] {
        let group = &value["Circulation"][quantity];
        assert_eq!(group["loop_sizes"][1].as_u64(), Some(4));

        // a constant wave function carries no momentum, so every sample is 0
        for r in 0..2 {
            let mean = group["Moments"]["mean"][0][r].as_f64().unwrap();
            assert!(mean.abs() < 1e-12, "{quantity} mean = {mean}");
            let abs_mean = group["Moments"]["abs_mean"][1][r].as_f64().unwrap();
            assert!(abs_mean.abs() < 1e-20);
            assert_eq!(
                group["Moments"]["Nsamples"][r].as_u64(),
                Some(points as u64)
            );

            // every near-zero sample lands in the central bin
            let counts = group["Histogram"]["counts"][r].as_array().unwrap();
            assert_eq!(counts[2].as_u64(), Some(points as u64));
            assert_eq!(group["Histogram"]["Nsamples"][r].as_u64(), Some(points as u64));
        }
    }

    fs::remove_dir_all(dir).ok();
}

#[test]
fn three_dimensional_domains_iterate_orientations_and_slice_caps() {
    let dir = scratch_dir("slices");
    let points = 8 * 8 * 4;
    write_constant_f64(&dir.join("ReaPsi.005.dat"), 1.0, points);
    write_constant_f64(&dir.join("ImaPsi.005.dat"), 0.0, points);
    let out_path = dir.join("out.json");

    let content = format!(
        r#"
[fields]
directory = "{dir}"
resolution = [8, 8, 4]
xi = 0.1
timesteps = [5]

[pipeline]
max_slices = 2

[circulation]
loop_sizes = [2]

[circulation.moments]
p_max = 1

[output]
path = "{out}"
"#,
        dir = dir.display(),
        out = out_path.display()
    );

    let config = PipelineConfig::from_str(&content).unwrap();
    let report = driver::run(&config).unwrap();
    // three orientations, two slices each
    assert_eq!(report.slices, 6);
    assert!(out_path.exists());

    fs::remove_dir_all(dir).ok();
}
