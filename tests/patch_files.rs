//! Patch files end to end: load a YAML patch with a group, render it and
//! write the result as a WAV file.

use assert_approx_eq::assert_approx_eq;

use patchwire::codegen::CompileContext;
use patchwire::graph::project::PatchFile;
use patchwire::graph::ControlValue;
use patchwire::lang::ast::ControlKind;
use patchwire::runtime::Runtime;

const PATCH: &str = r#"
version: 1
nodes:
  - name: voice
    group:
      nodes:
        - name: osc
          source: "out:output = level:knob ~> [linear]"
          controls:
            - { name: level, kind: knob, range: [0, 1], value: 0.4 }
            - { name: out, kind: output }
      exposed:
        - { node: osc, control: level, kind: knob }
        - { node: osc, control: out, kind: output }
  - name: bias
    source: "wire:num = 0.1"
    controls:
      - { name: wire, kind: num }
  - name: sum
    source: "out:output = sig:num"
    controls:
      - { name: sig, kind: num }
      - { name: out, kind: output }
links:
  - from: { node: sum, control: sig, kind: num }
    to: { node: bias, control: wire, kind: num }
"#;

fn load(dir: &tempfile::TempDir) -> (Runtime, std::path::PathBuf) {
    let path = dir.path().join("patch.yaml");
    std::fs::write(&path, PATCH).unwrap();
    let file = PatchFile::read(&path).unwrap();
    let runtime = Runtime::new(CompileContext::new(1000.0, 120.0));
    file.apply(&runtime).unwrap();
    runtime.compile().unwrap();
    (runtime, path)
}

#[test]
fn grouped_patch_sounds_through_exposed_output() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _) = load(&dir);
    // 0.4 from the group plus 0.1 through the link.
    assert_approx_eq!(rt.generate().left, 0.5, 1e-5);
}

#[test]
fn exposed_knob_is_editable_from_the_group() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _) = load(&dir);
    let root = rt.root();
    let voice = rt.with_patch(|p| {
        p.surface_nodes(root)
            .iter()
            .copied()
            .find(|n| p.node(*n).map(|n| n.name.as_str()) == Some("voice"))
    });
    let level = rt
        .find_control(voice.unwrap(), "level", ControlKind::Knob)
        .unwrap();
    rt.set_control(level, ControlValue::from(0.8)).unwrap();
    assert_approx_eq!(rt.generate().left, 0.9, 1e-5);
}

#[test]
fn saved_patch_reloads_with_live_values() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _) = load(&dir);
    let root = rt.root();
    let voice = rt.with_patch(|p| p.surface_nodes(root)[0]);
    let level = rt.find_control(voice, "level", ControlKind::Knob).unwrap();
    rt.set_control(level, ControlValue::from(0.2)).unwrap();

    let saved = dir.path().join("saved.yaml");
    PatchFile::capture(&rt).unwrap().write(&saved).unwrap();

    let reloaded = Runtime::new(CompileContext::new(1000.0, 120.0));
    PatchFile::read(&saved).unwrap().apply(&reloaded).unwrap();
    reloaded.compile().unwrap();
    assert_approx_eq!(reloaded.generate().left, 0.3, 1e-5);
}

#[test]
fn render_to_wav() {
    let dir = tempfile::tempdir().unwrap();
    let (rt, _) = load(&dir);

    let wav = dir.path().join("out.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 1000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&wav, spec).unwrap();
    let mut block = [0.0f32; 64];
    for _ in 0..4 {
        rt.fill_buffer(&mut block, 2);
        for sample in block {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();

    let mut reader = hound::WavReader::open(&wav).unwrap();
    assert_eq!(reader.spec().channels, 2);
    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 4 * 64);
    assert!(samples.iter().all(|s| (s - 0.5).abs() < 1e-5));
}
