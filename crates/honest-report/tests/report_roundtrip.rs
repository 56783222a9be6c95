use std::mem::{align_of, offset_of, size_of};

use honest_report::config::DumpTarget;
use honest_report::dump::{parse_report, render_report};
use honest_report::value::{FUNC_POINTER, PTR_NULL, STRUCT_VALUE};
use honest_report::{
    DedupPolicy, DumpOutcome, Recorder, ReportSlot, ReportSlotPayload, ReporterConfig,
    TaggedValue,
};

fn recorder(dir: &tempfile::TempDir, dedup: DedupPolicy) -> Recorder {
    Recorder::new(&ReporterConfig {
        dedup,
        output: DumpTarget::File(dir.path().join("honest_report.json")),
        ..ReporterConfig::default()
    })
}

#[test]
fn report_slot_layout_matches_c_header() {
    assert_eq!(size_of::<ReportSlotPayload>(), 16);
    assert_eq!(align_of::<ReportSlotPayload>(), 8);
    assert_eq!(size_of::<ReportSlot>(), 24);
    assert_eq!(offset_of!(ReportSlot, kind), 0);
    assert_eq!(offset_of!(ReportSlot, payload), 8);
}

#[test]
fn mixed_signature_survives_dump_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut r = recorder(&dir, DedupPolicy::Set);

    let scale = 3i64;
    let entry = "apply>>=double>>=float>>=%struct.Opts>>=void (i32)*>>=i64*>>=i1>>=";
    let ret = "apply>>=double>>=float>>=%struct.Opts>>=void (i32)*>>=i64*>>=i1>>=double>>=";
    let opts = ReportSlot::pointer(&scale as *const i64);
    let args = [
        ReportSlot::double(0.5),
        ReportSlot::double(2.0),
        opts,
        ReportSlot::pointer(std::ptr::null::<u8>()),
        ReportSlot::pointer(&scale as *const i64),
        ReportSlot::int(1),
    ];
    r.report(false, entry, &args);
    r.report(
        true,
        ret,
        &[ReportSlot::double(1.5), ReportSlot::pointer(&scale as *const i64)],
    );

    let inputs = vec![
        TaggedValue::new("0.5", "double"),
        TaggedValue::new("2", "float"),
        TaggedValue::new(STRUCT_VALUE, "%struct.Opts"),
        TaggedValue::new(FUNC_POINTER, "void (i32)*"),
        TaggedValue::new("ptr[3]", "i64*"),
        TaggedValue::new("1", "i1"),
    ];
    let outputs = vec![
        TaggedValue::new("1.5", "double"),
        TaggedValue::new("ptr[3]", "i64*"),
    ];
    assert_eq!(
        r.table().outputs("apply", &inputs).unwrap(),
        &[outputs.clone()]
    );

    assert_eq!(r.dump().unwrap(), DumpOutcome::Written { functions: 1 });
    let text = std::fs::read_to_string(dir.path().join("honest_report.json")).unwrap();
    let parsed = parse_report(&text).unwrap();
    assert_eq!(parsed["apply"][&inputs], vec![outputs]);
}

#[test]
fn null_pointer_inputs_are_keys_like_any_other() {
    let dir = tempfile::tempdir().unwrap();
    let mut r = recorder(&dir, DedupPolicy::Set);
    let null = ReportSlot::pointer(std::ptr::null::<i32>());
    r.report(false, "len>>=i8*>>=", &[null]);
    r.report(true, "len>>=i8*>>=i64>>=", &[ReportSlot::int(0), null]);

    let inputs = vec![TaggedValue::new(PTR_NULL, "i8*")];
    assert_eq!(
        r.table().outputs("len", &inputs).unwrap(),
        &[vec![
            TaggedValue::new("0", "i64"),
            TaggedValue::new(PTR_NULL, "i8*"),
        ]]
    );
}

#[test]
fn list_policy_keeps_repeats_in_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let mut r = recorder(&dir, DedupPolicy::List);
    for out in [7, 7, 8] {
        r.report(false, "add>>=i32>>=i32>>=", &[ReportSlot::int(3), ReportSlot::int(4)]);
        r.report(true, "add>>=i32>>=i32>>=i32>>=", &[ReportSlot::int(out)]);
    }
    let parsed = parse_report(&render_report(r.table()).unwrap()).unwrap();
    let inputs = vec![TaggedValue::new("3", "i32"), TaggedValue::new("4", "i32")];
    let values: Vec<&str> = parsed["add"][&inputs]
        .iter()
        .map(|o| o[0].value.as_str())
        .collect();
    assert_eq!(values, ["7", "7", "8"]);
}

#[test]
fn decoding_twice_gives_identical_tables() {
    let dir = tempfile::tempdir().unwrap();
    let x = -12i32;
    let run = || {
        let mut r = recorder(&dir, DedupPolicy::Set);
        r.report(
            false,
            "f>>=i32*>>=i16>>=double>>=",
            &[
                ReportSlot::pointer(&x as *const i32),
                ReportSlot::int(-2),
                ReportSlot::double(f64::NAN),
            ],
        );
        r.report(true, "f>>=i32*>>=i16>>=double>>=i32>>=", &[ReportSlot::int(9)]);
        render_report(r.table()).unwrap()
    };
    assert_eq!(run(), run());
}
