//! Request planner: fold a device's active registers into the minimal set
//! of contiguous Modbus reads.
//!
//! Planned once at engine construction and immutable afterwards. The rule
//! is purely positional: a register extends the open request iff its
//! address equals the request's address plus its accumulated word count.
//! Inactive registers never contribute and therefore break contiguity.

use std::fmt;

use fieldscan_codec::{Adjust, RegisterFormat};
use fieldscan_config::{Connection, Device, FunctionCode};

/// Decode recipe of one planned point.
#[derive(Debug, Clone)]
pub struct PointSpec {
    /// Display name, for diagnostics only.
    pub name: String,
    /// Wire format of the raw window.
    pub format: RegisterFormat,
    /// Adjustment chain applied after decoding.
    pub adjustments: Vec<Adjust>,
}

/// Where one point's raw window sits inside its request's response.
#[derive(Debug, Clone)]
pub struct PointWindow {
    /// Word offset from the start of the response.
    pub offset: usize,
    /// Window length in words, fixed by the format.
    pub len: usize,
    /// How to turn the window into a sample.
    pub spec: PointSpec,
}

/// One contiguous Modbus read plus its response splice plan.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// Function code of every register in this request.
    pub function: FunctionCode,
    /// First register address.
    pub address: u16,
    /// Total words (or bits for functions 1/2) to read.
    pub count: u16,
    /// Modbus unit id the request is addressed to.
    pub slave: u8,
    /// Windows in address order; they tile `[0, count)` left to right.
    pub windows: Vec<PointWindow>,
}

impl fmt::Display for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @{}x{} slave {}",
            self.function, self.address, self.count, self.slave
        )
    }
}

/// Immutable polling recipe for one active device.
#[derive(Debug, Clone)]
pub struct DevicePlan {
    /// Device name, for diagnostics and column provenance.
    pub device: String,
    /// Endpoint the requests go out on.
    pub connection: Connection,
    /// Requests in function-code then address order.
    pub requests: Vec<ReadRequest>,
    /// Total points the plan yields per cycle.
    pub point_count: usize,
}

/// Plan one device. Pure and deterministic.
pub fn plan_device(device: &Device) -> DevicePlan {
    let slave = device.connection.config.address;
    let mut requests = Vec::new();

    for (function, registers) in device.registers.iter() {
        let mut open: Option<ReadRequest> = None;
        for (&address, register) in registers {
            if !register.active {
                continue;
            }
            let len = register.format.word_len() as u16;
            let spec = PointSpec {
                name: register.name.clone(),
                format: register.format,
                adjustments: register.adjustments.clone(),
            };

            match open {
                Some(ref mut request)
                    if u32::from(request.address) + u32::from(request.count)
                        == u32::from(address) =>
                {
                    request.windows.push(PointWindow {
                        offset: usize::from(request.count),
                        len: usize::from(len),
                        spec,
                    });
                    request.count += len;
                }
                _ => {
                    if let Some(done) = open.take() {
                        requests.push(done);
                    }
                    open = Some(ReadRequest {
                        function,
                        address,
                        count: len,
                        slave,
                        windows: vec![PointWindow {
                            offset: 0,
                            len: usize::from(len),
                            spec,
                        }],
                    });
                }
            }
        }
        if let Some(done) = open.take() {
            requests.push(done);
        }
    }

    let point_count = requests.iter().map(|r| r.windows.len()).sum();
    DevicePlan {
        device: device.name.clone(),
        connection: device.connection.clone(),
        requests,
        point_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldscan_config::Config;

    fn device(holding: &str) -> Device {
        let yaml = format!(
            r#"
log level: 20
table: t
devices:
  - name: rig
    active: true
    connection:
      transport: TCP
      src: 10.0.0.1
      config: {{ address: 3, timeout: 500 }}
    registers:
      03 Read Holding Registers:
{holding}
"#
        );
        Config::from_yaml(&yaml).unwrap().devices.remove(0)
    }

    fn register(name: &str, active: bool, format: &str) -> String {
        format!(
            "          name: {name}\n          active: {active}\n          format: {format}\n          type: REAL\n"
        )
    }

    #[test]
    fn adjacent_registers_merge_across_formats() {
        // 100 (1 word) + 101 (2 words) + 103 (1 word) is one read of 4.
        let holding = format!(
            "        100:\n{}        101:\n{}        103:\n{}",
            register("a", true, "Unsigned"),
            register("b", true, "Float AB CD"),
            register("c", true, "Signed"),
        );
        let plan = plan_device(&device(&holding));
        assert_eq!(plan.requests.len(), 1);
        let request = &plan.requests[0];
        assert_eq!(request.function, FunctionCode::HoldingRegisters);
        assert_eq!((request.address, request.count, request.slave), (100, 4, 3));
        let offsets: Vec<(usize, usize)> =
            request.windows.iter().map(|w| (w.offset, w.len)).collect();
        assert_eq!(offsets, vec![(0, 1), (1, 2), (3, 1)]);
    }

    #[test]
    fn address_gap_splits_requests() {
        let holding = format!(
            "        100:\n{}        200:\n{}",
            register("a", true, "Unsigned"),
            register("b", true, "Unsigned"),
        );
        let plan = plan_device(&device(&holding));
        let spans: Vec<(u16, u16)> =
            plan.requests.iter().map(|r| (r.address, r.count)).collect();
        assert_eq!(spans, vec![(100, 1), (200, 1)]);
    }

    #[test]
    fn inactive_register_breaks_contiguity() {
        // 101 is skipped, so 102 opens a fresh request even though the
        // addresses around the hole line up word-for-word.
        let holding = format!(
            "        100:\n{}        101:\n{}        102:\n{}",
            register("a", true, "Unsigned"),
            register("b", false, "Unsigned"),
            register("c", true, "Unsigned"),
        );
        let plan = plan_device(&device(&holding));
        let spans: Vec<(u16, u16)> =
            plan.requests.iter().map(|r| (r.address, r.count)).collect();
        assert_eq!(spans, vec![(100, 1), (102, 1)]);
        assert_eq!(plan.point_count, 2);
    }

    #[test]
    fn a_positional_hole_left_by_an_inactive_register_can_still_merge() {
        // 12 is inactive, but the double at 10 spans words 10..14, so 14
        // lines up positionally and stays in the same request.
        let holding = format!(
            "        10:\n{}        12:\n{}        14:\n{}",
            register("a", true, "Double AB CD EF GH"),
            register("b", false, "Unsigned"),
            register("c", true, "Long CD AB"),
        );
        let plan = plan_device(&device(&holding));
        let spans: Vec<(u16, u16)> =
            plan.requests.iter().map(|r| (r.address, r.count)).collect();
        assert_eq!(spans, vec![(10, 6)]);
        assert_eq!(plan.point_count, 2);
    }

    #[test]
    fn word_counts_are_conserved_per_function() {
        let holding = format!(
            "        10:\n{}        20:\n{}",
            register("a", true, "Double AB CD EF GH"),
            register("b", true, "Long CD AB"),
        );
        let plan = plan_device(&device(&holding));
        let requested: u16 = plan.requests.iter().map(|r| r.count).sum();
        let footprint: usize = plan
            .requests
            .iter()
            .flat_map(|r| r.windows.iter())
            .map(|w| w.len)
            .sum();
        assert_eq!(requested, 6);
        assert_eq!(footprint, 6);
    }

    #[test]
    fn empty_groups_emit_nothing() {
        let plan = plan_device(&device(""));
        assert!(plan.requests.is_empty());
        assert_eq!(plan.point_count, 0);
    }

    #[test]
    fn planning_is_deterministic() {
        let holding = format!(
            "        100:\n{}        101:\n{}",
            register("a", true, "Unsigned"),
            register("b", true, "Float DC BA"),
        );
        let device = device(&holding);
        let first = plan_device(&device);
        let second = plan_device(&device);
        assert_eq!(format!("{:?}", first), format!("{:?}", second));
    }
}
