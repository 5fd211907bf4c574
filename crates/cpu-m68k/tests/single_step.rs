//! Data-driven single-step tests.
//!
//! Each case describes an initial register/memory state, one instruction,
//! and the expected final state, in the JSON shape used by single-step
//! CPU test suites. The table here is inline; the runner accepts any
//! number of cases.

mod common;

use common::{FC, setup};
use serde::Deserialize;

#[derive(Deserialize)]
struct Case {
    name: String,
    /// Opcode and extension words at the initial PC.
    code: Vec<u16>,
    #[serde(default)]
    d: Vec<u32>,
    #[serde(default)]
    a: Vec<u32>,
    #[serde(default)]
    ccr: u8,
    #[serde(default)]
    ram: Vec<(u32, u8)>,
    expected: Expected,
}

#[derive(Deserialize)]
struct Expected {
    #[serde(default)]
    d: Vec<(usize, u32)>,
    #[serde(default)]
    a: Vec<(usize, u32)>,
    #[serde(default)]
    ccr: Option<u8>,
    #[serde(default)]
    pc: Option<u32>,
    #[serde(default)]
    ram: Vec<(u32, u8)>,
}

const PC0: u32 = 0x1000;

fn run_case(case: &Case) {
    let (mut c, eu) = setup(0x8000);
    c.regs.pc = PC0;
    c.regs.a[7] = 0x7000;
    for (i, v) in case.d.iter().enumerate() {
        c.regs.d[i] = *v;
    }
    for (i, v) in case.a.iter().enumerate() {
        c.regs.a[i] = *v;
    }
    c.regs.sr.set_ccr(case.ccr);
    for (i, w) in case.code.iter().enumerate() {
        c.mem.put_16(PC0 + 2 * i as u32, *w, FC).unwrap();
    }
    for (addr, byte) in &case.ram {
        c.mem.put_8(*addr, *byte, FC).unwrap();
    }

    c.step(&eu).expect("fatal error");

    for (i, v) in &case.expected.d {
        assert_eq!(c.regs.d[*i], *v, "{}: D{i}", case.name);
    }
    for (i, v) in &case.expected.a {
        assert_eq!(c.regs.a[*i], *v, "{}: A{i}", case.name);
    }
    if let Some(ccr) = case.expected.ccr {
        assert_eq!(c.regs.sr.ccr(), ccr, "{}: CCR", case.name);
    }
    if let Some(pc) = case.expected.pc {
        assert_eq!(c.regs.pc, pc, "{}: PC", case.name);
    }
    for (addr, byte) in &case.expected.ram {
        assert_eq!(c.mem.get_8(*addr, FC).unwrap(), *byte, "{}: ram {addr:#x}", case.name);
    }
}

#[test]
fn single_step_table() {
    let cases: Vec<Case> = serde_json::from_str(CASES).expect("malformed test table");
    assert!(!cases.is_empty());
    for case in &cases {
        run_case(case);
    }
}

const CASES: &str = r#"[
  {
    "name": "add.b d0,d1 with carry",
    "code": [53760],
    "d": [128, 129],
    "expected": { "d": [[1, 1]], "ccr": 17, "pc": 4098 }
  },
  {
    "name": "add.b d0,d1 overflow positive",
    "code": [53760],
    "d": [64, 64],
    "expected": { "d": [[1, 128]], "ccr": 10, "pc": 4098 }
  },
  {
    "name": "sub.w d0,d1 borrow",
    "code": [37440],
    "d": [2, 1],
    "expected": { "d": [[1, 65535]], "ccr": 25, "pc": 4098 }
  },
  {
    "name": "cmp.w d1,d1 equal leaves x",
    "code": [45633],
    "d": [1000, 1000],
    "ccr": 16,
    "expected": { "ccr": 20, "pc": 4098 }
  },
  {
    "name": "and.w d0,d1",
    "code": [49728],
    "d": [4080, 255],
    "expected": { "d": [[1, 240]], "ccr": 0, "pc": 4098 }
  },
  {
    "name": "or.b d0,(a2)",
    "code": [33042],
    "d": [15],
    "a": [0, 0, 8192],
    "ram": [[8192, 48]],
    "expected": { "ram": [[8192, 63]], "ccr": 0, "pc": 4098 }
  },
  {
    "name": "eor.l d1,d1 clears",
    "code": [45953],
    "d": [0, 3735928559],
    "expected": { "d": [[1, 0]], "ccr": 4, "pc": 4098 }
  },
  {
    "name": "neg.b of most negative overflows",
    "code": [17409],
    "d": [0, 128],
    "expected": { "d": [[1, 128]], "ccr": 27, "pc": 4098 }
  },
  {
    "name": "clr.w keeps upper half",
    "code": [16961],
    "d": [0, 4294967295],
    "expected": { "d": [[1, 4294901760]], "ccr": 4, "pc": 4098 }
  },
  {
    "name": "not.l d1",
    "code": [18049],
    "d": [0, 4294901760],
    "expected": { "d": [[1, 65535]], "ccr": 0, "pc": 4098 }
  },
  {
    "name": "asr.w #1,d4 keeps sign",
    "code": [57924],
    "d": [0, 0, 0, 0, 32768],
    "expected": { "d": [[4, 49152]], "ccr": 8, "pc": 4098 }
  },
  {
    "name": "lsr.w #1,d4 shifts zero in",
    "code": [57932],
    "d": [0, 0, 0, 0, 32769],
    "expected": { "d": [[4, 16384]], "ccr": 17, "pc": 4098 }
  },
  {
    "name": "swap d0",
    "code": [18496],
    "d": [18],
    "expected": { "d": [[0, 1179648]], "pc": 4098 }
  },
  {
    "name": "ext.w sign extends byte",
    "code": [18563],
    "d": [0, 0, 0, 240],
    "expected": { "d": [[3, 65520]], "ccr": 8, "pc": 4098 }
  },
  {
    "name": "move.b d2,-(a1)",
    "code": [4866],
    "d": [0, 0, 90],
    "a": [0, 8200],
    "expected": { "a": [[1, 8199]], "ram": [[8199, 90]], "pc": 4098 }
  },
  {
    "name": "subx.b d1,d0 propagates borrow",
    "code": [37121],
    "d": [5, 5],
    "ccr": 16,
    "expected": { "d": [[0, 255]], "ccr": 25, "pc": 4098 }
  }
]"#;
