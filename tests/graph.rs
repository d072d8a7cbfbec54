//! Node graph integration tests: links, groups and exposed controls,
//! observed through the runtime's output.

use assert_approx_eq::assert_approx_eq;

use patchwire::codegen::CompileContext;
use patchwire::graph::{ControlValue, GraphError};
use patchwire::lang::ast::ControlKind;
use patchwire::runtime::{Runtime, RuntimeError};
use patchwire::value::MidiEvent;

fn runtime() -> Runtime {
    Runtime::new(CompileContext::new(1000.0, 120.0))
}

#[test]
fn linked_nodes_run_writer_first() {
    let rt = runtime();
    let root = rt.root();
    // Created reader-first; scheduling must still run the writer before it.
    let sink = rt.create_node(root, "sink").unwrap();
    let source = rt.create_node(root, "source").unwrap();
    rt.set_source(sink, "out:output = sig:num * 2").unwrap();
    rt.set_source(source, "wire:num = 0.25").unwrap();
    rt.compile().unwrap();

    let sig = rt.find_control(sink, "sig", ControlKind::Num).unwrap();
    let wire = rt.find_control(source, "wire", ControlKind::Num).unwrap();
    rt.connect(sig, wire).unwrap();
    rt.compile().unwrap();

    assert_approx_eq!(rt.generate().left, 0.5);
}

#[test]
fn connect_rejects_mismatched_classes() {
    let rt = runtime();
    let root = rt.root();
    let a = rt.create_node(root, "a").unwrap();
    let b = rt.create_node(root, "b").unwrap();
    let num = rt.create_control(a, "x", ControlKind::Num).unwrap();
    let midi = rt.create_control(b, "y", ControlKind::Midi).unwrap();
    let err = rt.connect(num, midi).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Graph(GraphError::IncompatibleControls { .. })
    ));
}

#[test]
fn exposed_output_sounds_at_root() {
    let rt = runtime();
    let (voice, inner) = rt.create_group(rt.root(), "voice").unwrap();
    let osc = rt.create_node(inner, "osc").unwrap();
    rt.set_source(osc, "out:output = 0.3").unwrap();
    rt.compile().unwrap();
    // Not exposed: nothing reaches the host.
    assert_eq!(rt.generate().left, 0.0);

    let out = rt.find_control(osc, "out", ControlKind::Output).unwrap();
    let forwarder = rt.expose(out).unwrap();
    assert_eq!(rt.expose(out).unwrap(), forwarder);
    assert_eq!(
        rt.find_control(voice, "out", ControlKind::Output),
        Some(forwarder)
    );
    rt.compile().unwrap();
    assert_approx_eq!(rt.generate().left, 0.3);

    rt.unexpose(out).unwrap();
    rt.compile().unwrap();
    assert_eq!(rt.generate().left, 0.0);
}

#[test]
fn exposed_knob_reads_and_writes_through() {
    let rt = runtime();
    let (_, inner) = rt.create_group(rt.root(), "voice").unwrap();
    let osc = rt.create_node(inner, "osc").unwrap();
    rt.set_source(osc, "out:output = level:knob ~> [linear]").unwrap();
    rt.compile().unwrap();
    let out = rt.find_control(osc, "out", ControlKind::Output).unwrap();
    let level = rt.find_control(osc, "level", ControlKind::Knob).unwrap();
    rt.expose(out).unwrap();
    let outer = rt.expose(level).unwrap();
    rt.compile().unwrap();

    rt.set_control(outer, ControlValue::from(0.6)).unwrap();
    assert_eq!(rt.get_control(level).unwrap(), rt.get_control(outer).unwrap());
    assert_approx_eq!(rt.generate().left, 0.6);

    rt.set_control(level, ControlValue::from(0.2)).unwrap();
    assert_eq!(rt.get_control(outer).unwrap(), ControlValue::from(0.2));
    assert_approx_eq!(rt.generate().left, 0.2);
}

#[test]
fn group_output_feeds_sibling_through_link() {
    let rt = runtime();
    let root = rt.root();
    let (voice, inner) = rt.create_group(root, "voice").unwrap();
    let osc = rt.create_node(inner, "osc").unwrap();
    rt.set_source(osc, "sig:num = 0.5").unwrap();
    let mixer = rt.create_node(root, "mixer").unwrap();
    rt.set_source(mixer, "out:output = src:num + 0.1").unwrap();
    rt.compile().unwrap();

    let sig = rt.find_control(osc, "sig", ControlKind::Num).unwrap();
    let exposed = rt.expose(sig).unwrap();
    let input = rt.find_control(mixer, "src", ControlKind::Num).unwrap();
    rt.connect(exposed, input).unwrap();
    rt.compile().unwrap();

    assert_approx_eq!(rt.generate().left, 0.6);
    assert!(rt.with_patch(|p| p.node(voice).is_some_and(|n| n.is_group())));
}

#[test]
fn removing_group_removes_its_contents() {
    let rt = runtime();
    let (voice, inner) = rt.create_group(rt.root(), "voice").unwrap();
    let osc = rt.create_node(inner, "osc").unwrap();
    rt.set_source(osc, "out:output = 0.3").unwrap();
    rt.remove_node(voice).unwrap();
    assert!(rt.with_patch(|p| p.node(osc).is_none()));
    assert!(matches!(
        rt.set_source(osc, "x = 1"),
        Err(RuntimeError::Graph(GraphError::UnknownNode(_)))
    ));
    rt.compile().unwrap();
}

#[test]
fn bound_controls_cannot_be_renamed() {
    let rt = runtime();
    let n = rt.create_node(rt.root(), "n").unwrap();
    rt.set_source(n, "out:output = gain:knob ~> [linear]").unwrap();
    rt.compile().unwrap();
    let gain = rt.find_control(n, "gain", ControlKind::Knob).unwrap();
    assert!(matches!(
        rt.rename_control(gain, "volume"),
        Err(RuntimeError::Graph(GraphError::BoundControl(_)))
    ));

    let spare = rt.create_control(n, "spare", ControlKind::Toggle).unwrap();
    rt.rename_control(spare, "extra").unwrap();
    assert_eq!(rt.find_control(n, "extra", ControlKind::Toggle), Some(spare));
}

#[test]
fn knob_range_shapes_the_value() {
    let rt = runtime();
    let n = rt.create_node(rt.root(), "n").unwrap();
    let gain = rt.create_control(n, "gain", ControlKind::Knob).unwrap();
    rt.set_knob_range(gain, 10.0, 20.0).unwrap();
    rt.set_source(n, "out:output = gain:knob ~> [linear]").unwrap();
    rt.compile().unwrap();
    rt.set_control(gain, ControlValue::from(0.5)).unwrap();
    assert_approx_eq!(rt.generate().left, 15.0);
}

#[test]
fn compile_failure_lists_every_failing_node() {
    let rt = runtime();
    let a = rt.create_node(rt.root(), "a").unwrap();
    let b = rt.create_node(rt.root(), "b").unwrap();
    let c = rt.create_node(rt.root(), "c").unwrap();
    rt.set_source(a, "out:output = nope").unwrap();
    rt.set_source(b, "x = (1").unwrap();
    rt.set_source(c, "out:output = 0.1").unwrap();
    let Err(RuntimeError::Graph(GraphError::Compile(failures))) = rt.compile() else {
        panic!("expected a compile failure");
    };
    let mut failed: Vec<_> = failures.iter().map(|(node, _)| *node).collect();
    failed.sort();
    assert_eq!(failed, vec![a, b]);
    assert!(rt.node_errors(c).unwrap().is_empty());
}

#[test]
fn midi_inside_group_is_delivered_once() {
    let rt = runtime();
    let (_, inner) = rt.create_group(rt.root(), "voice").unwrap();
    let synth = rt.create_node(inner, "synth").unwrap();
    rt.set_source(synth, "out:output = voices(keys:midi)").unwrap();
    rt.compile().unwrap();
    let out = rt.find_control(synth, "out", ControlKind::Output).unwrap();
    rt.expose(out).unwrap();
    rt.compile().unwrap();

    let keys = rt.find_control(synth, "keys", ControlKind::Midi).unwrap();
    rt.push_midi(keys, MidiEvent::note_on(0, 60, 100)).unwrap();
    let counts: Vec<f32> = (0..3).map(|_| rt.generate().left).collect();
    assert_eq!(counts, vec![1.0, 1.0, 1.0]);

    rt.queue_event(keys, MidiEvent::note_off(0, 60).at(1));
    let counts: Vec<f32> = (0..3).map(|_| rt.generate().left).collect();
    assert_eq!(counts, vec![1.0, 0.0, 0.0]);
}

#[test]
fn midi_through_exposed_control_is_delivered_once() {
    let rt = runtime();
    let (voice, inner) = rt.create_group(rt.root(), "voice").unwrap();
    let synth = rt.create_node(inner, "synth").unwrap();
    rt.set_source(synth, "out:output = voices(keys:midi)").unwrap();
    rt.compile().unwrap();
    rt.expose(rt.find_control(synth, "out", ControlKind::Output).unwrap())
        .unwrap();
    rt.expose(rt.find_control(synth, "keys", ControlKind::Midi).unwrap())
        .unwrap();
    rt.compile().unwrap();

    let keys = rt.find_control(voice, "keys", ControlKind::Midi).unwrap();
    rt.push_midi(keys, MidiEvent::note_on(0, 60, 100)).unwrap();
    rt.push_midi(keys, MidiEvent::note_on(0, 62, 100)).unwrap();
    let counts: Vec<f32> = (0..3).map(|_| rt.generate().left).collect();
    assert_eq!(counts, vec![2.0, 2.0, 2.0]);
}
