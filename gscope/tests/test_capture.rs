use gscope::domain::UnitIndex;
use gscope::profile::TargetProfile;
use gscope::remote::MemoryImage;
use gscope::session;
use gscope_common::{
    bytes_of, DebugFileInfo, GscObj, ObjFileInfo, ScrVar, ScrVarGlob, ScrVarStackBuffer, ScrVarValue, VarType,
    STACK_BUFFER_DATA_OFFSET,
};

const BASE: u64 = 0x1_4000_0000;
const ARENA: u64 = 0x10_0000;

fn gsc_obj(cseg_offset: u32, cseg_size: u32) -> GscObj {
    GscObj {
        magic: [0; 8],
        source_crc: 0,
        include_offset: 0,
        animtree_offset: 0,
        cseg_offset,
        stringtablefixup_offset: 0,
        _unknown_0x1c: [0; 5],
        cseg_size,
        _unknown_0x34: 0,
        _unknown_0x38: [0; 6],
        _unknown_0x44: [0; 4],
    }
}

fn obj_file_info(obj: u64, filename: u64, line_table: u64, line_count: i32) -> ObjFileInfo {
    ObjFileInfo {
        active_version: obj,
        baseline_version: obj,
        debug_info: DebugFileInfo {
            filename,
            start_addr: 0,
            end_addr: 0,
            line_start_addr: line_table,
            line_start_addr_count: line_count,
            _unknown_0x24: 0,
            source: 0,
            source_len: 0,
            _unknown_0x34: 0,
            gdb: 0,
        },
    }
}

fn var(ty: VarType, u: u64) -> ScrVar {
    ScrVar {
        value: ScrVarValue { u, raw_type: ty as u8, _unknown_0x9: [0; 3], _pad: 0 },
        info: 0,
        _unknown_0x14: [0; 4],
        object: 0,
        object_w: 0,
        _unknown_0x24: [0; 4],
        name_index: 0,
        next_sibling: 0,
        prev_sibling: 0,
        parent_id: 0,
        name_search_hash_list: 0,
    }
}

fn map_frame(image: &mut MemoryImage, addr: u64, pos: u64, size: u16, code_positions: &[u64]) {
    let header = ScrVarStackBuffer { pos, _unknown_0x8: [0; 4], size, buf_len: size, thread_id: 1, buf_head: [0; 4] };
    let mut bytes = bytes_of(&header)[..STACK_BUFFER_DATA_OFFSET as usize].to_vec();
    for &code_pos in code_positions {
        bytes.push(VarType::CodePos as u8);
        bytes.extend_from_slice(&code_pos.to_le_bytes());
    }
    bytes.resize(bytes.len().max(std::mem::size_of::<ScrVarStackBuffer>()), 0);
    image.map_bytes(addr, bytes);
}

fn profile() -> TargetProfile {
    TargetProfile { variable_capacity: 4, ..TargetProfile::default() }
}

/// U0 = [1000, 1100) without line table, U1 = [2000, 2050) with lines
/// [2000, 2010, 2020]; one frame suspended at 2015 with a nested CODEPOS 1050.
fn scenario() -> MemoryImage {
    let profile = profile();
    let mut image = MemoryImage::new();
    image.add_module("BlackOps3.exe", BASE);

    // Self-relative ranges: 768 + 232 = 1000, 1792 + 208 = 2000
    image.map_records(768, &[gsc_obj(232, 100)]);
    image.map_records(1792, &[gsc_obj(208, 50)]);
    image.map_records(0x8000, &[2000_u64, 2010, 2020]);
    image.map_c_string(0x9000, "scripts/shared/util_shared.gsc", 64);
    image.map_c_string(0x9100, "scripts/zm/_zm.gsc", 64);

    image.map_records(BASE + profile.obj_file_info_count_rva, &[2_i32]);
    image.map_records(
        BASE + profile.obj_file_info_rva,
        &[obj_file_info(768, 0x9000, 0, 0), obj_file_info(1792, 0x9100, 0x8000, 3)],
    );

    let glob = ScrVarGlob {
        script_name_search_hash_list: 0,
        _unknown_0x8: [0; 0x78],
        script_variables: ARENA,
        _unknown_0x88: [0; 0x78],
    };
    image.map_records(BASE + profile.scr_var_glob_rva, &[glob]);
    image.map_records(
        ARENA,
        &[var(VarType::Stack, 0x20_0000), var(VarType::Integer, 2015), var(VarType::Free, 0), var(VarType::Stack, 0)],
    );
    map_frame(&mut image, 0x20_0000, 2015, 9, &[1050]);

    image
}

#[test]
fn test_end_to_end_scenario() {
    let report = session::capture(&scenario(), &profile()).expect("capture failed");

    assert_eq!(report.frames_scanned, 1);
    assert_eq!(report.unresolved_positions, 0);
    assert_eq!(report.units.len(), 2);

    let u0 = &report.units[0];
    assert_eq!(u0.index, UnitIndex(0));
    assert_eq!(u0.file, "scripts/shared/util_shared.gsc");
    assert_eq!(u0.usage_count, 1);
    assert!(u0.lines.is_empty());

    let u1 = &report.units[1];
    assert_eq!(u1.index, UnitIndex(1));
    assert_eq!(u1.file, "scripts/zm/_zm.gsc");
    assert_eq!(u1.usage_count, 1);
    assert_eq!(u1.lines, vec![1]);
}

#[test]
fn test_text_output() {
    let report = session::capture(&scenario(), &profile()).unwrap();
    let mut out = Vec::new();
    report.write_text(&mut out).unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        "scripts/shared/util_shared.gsc has 1 threads\nscripts/zm/_zm.gsc has 1 threads\n\t@ line 1\n"
    );
}

#[test]
fn test_capture_is_idempotent() {
    let image = scenario();
    let first = session::capture(&image, &profile()).unwrap();
    let second = session::capture(&image, &profile()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unreadable_unit_header_only_affects_that_unit() {
    let healthy = session::capture(&scenario(), &profile()).unwrap();

    let mut image = scenario();
    image.poison(768);
    let degraded = session::capture(&image, &profile()).unwrap();

    assert_eq!(degraded.units.len(), 1);
    assert_eq!(degraded.units[0], healthy.units[1]);
    // 1050 no longer belongs to any known unit
    assert_eq!(degraded.unresolved_positions, 1);
}

#[test]
fn test_corrupt_frame_size_keeps_suspended_position() {
    let mut image = scenario();
    // 10 bytes: not a whole number of entries, nested CODEPOS must be ignored
    map_frame(&mut image, 0x20_0000, 2015, 10, &[1050]);

    let report = session::capture(&image, &profile()).unwrap();
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].index, UnitIndex(1));
    assert_eq!(report.units[0].lines, vec![1]);
}

#[test]
fn test_freed_frame_is_skipped() {
    let mut image = scenario();
    image.unmap(0x20_0000);

    let report = session::capture(&image, &profile()).unwrap();
    assert_eq!(report.frames_scanned, 0);
    assert!(report.units.is_empty());
}

#[test]
fn test_unreadable_variable_arena_reports_nothing() {
    let mut image = scenario();
    image.unmap(ARENA);

    let report = session::capture(&image, &profile()).unwrap();
    assert!(report.units.is_empty());
}

#[test]
fn test_list_units() {
    let units = session::list_units(&scenario(), &profile()).unwrap();

    assert_eq!(units.len(), 2);
    assert_eq!(units[0].format(), "scripts/shared/util_shared.gsc:0 [0x3e8, 0x44c)");
    assert_eq!(units[1].line_count, 3);
    assert_eq!(units[1].code_range, Some((2000, 2050)));
}

#[test]
fn test_capacity_past_arena_end_still_reports() {
    // The arena holds 4 slots; reading 64 runs off the end of its mapping
    let generous = TargetProfile { variable_capacity: 64, ..profile() };
    let report = session::capture(&scenario(), &generous).unwrap();

    assert_eq!(report.frames_scanned, 1);
    assert_eq!(report.units, session::capture(&scenario(), &profile()).unwrap().units);
}
