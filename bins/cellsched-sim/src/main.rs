use clap::Parser;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;

use nr_config::toml_config::{self, SimConfig, SimUeConfig};
use nr_core::{CellIndex, HarqId, LcId, LcgId, Rnti, SlotPoint, TagId, UeIndex, debug};
use nr_msgs::feedback::{
    BsrFormat, BsrIndication, CrcIndication, CrcPdu, CsiReport, DlBufferStateIndication, HarqAck, UciIndication,
    UciPdu,
};
use nr_msgs::{SchedNotifier, SubPdu, UeCreationRequest};
use nr_sched::MacScheduler;

/// Probability that a transport block decodes on first sight
const DECODE_PROB: f64 = 0.9;
/// Slot at which simulated UEs confirm their dedicated configuration
const CONFIG_APPLIED_SLOT: u64 = 20;

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SimConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

struct SimNotifier;

impl SchedNotifier for SimNotifier {
    fn on_ue_config_complete(&self, ue_index: UeIndex, success: bool) {
        if success {
            tracing::info!("{}: configuration complete", ue_index);
        } else {
            tracing::error!("{}: configuration failed", ue_index);
        }
    }

    fn on_ue_deletion_complete(&self, ue_index: UeIndex) {
        tracing::info!("{}: deletion complete", ue_index);
    }
}

/// Traffic model state for one simulated UE
struct SimUe {
    ue_index: UeIndex,
    crnti: Rnti,
    /// Channel carrying the offered load (last configured LC)
    lcid: LcId,
    lcg: LcgId,
    dl_load_bytes: u32,
    ul_load_bytes: u32,
    dl_queue: u32,
    ul_queue: u32,
}

impl SimUe {
    fn new(index: u16, cfg: &SimUeConfig) -> Self {
        let loaded = cfg.lc_list.last().expect("ue without logical channels");
        Self {
            ue_index: UeIndex::new(index),
            crnti: Rnti(cfg.crnti),
            lcid: loaded.lcid,
            lcg: loaded.lcg,
            dl_load_bytes: cfg.dl_load_bytes,
            ul_load_bytes: cfg.ul_load_bytes,
            dl_queue: 0,
            ul_queue: 0,
        }
    }
}

/// Feedback produced by the simulated UEs, delivered with its air-interface
/// delay
enum Feedback {
    DlAck {
        due: SlotPoint,
        ue_index: UeIndex,
        crnti: Rnti,
        harq_id: HarqId,
        ack: bool,
    },
    UlCrc {
        due: SlotPoint,
        ue_index: UeIndex,
        crnti: Rnti,
        harq_id: HarqId,
        ok: bool,
        ta: Option<i32>,
    },
}

impl Feedback {
    fn due(&self) -> SlotPoint {
        match self {
            Feedback::DlAck { due, .. } => *due,
            Feedback::UlCrc { due, .. } => *due,
        }
    }
}

fn deliver_due_feedback(sched: &MacScheduler, pending: &mut VecDeque<Feedback>, slot: SlotPoint) {
    while pending.front().is_some_and(|f| !f.due().is_after(slot)) {
        match pending.pop_front().unwrap() {
            Feedback::DlAck {
                ue_index,
                crnti,
                harq_id,
                ack,
                ..
            } => {
                sched.handle_uci_indication(UciIndication {
                    cell_index: CellIndex(0),
                    slot,
                    ucis: vec![UciPdu {
                        ue_index,
                        crnti,
                        harqs: vec![(harq_id, if ack { HarqAck::Ack } else { HarqAck::Nack })],
                        sr_detected: false,
                        csi: None,
                    }],
                });
            }
            Feedback::UlCrc {
                ue_index,
                crnti,
                harq_id,
                ok,
                ta,
                ..
            } => {
                sched.handle_crc_indication(CrcIndication {
                    cell_index: CellIndex(0),
                    slot,
                    crcs: vec![CrcPdu {
                        ue_index,
                        rnti: crnti,
                        harq_id,
                        tb_crc_success: ok,
                        ul_sinr_db: Some(18.0),
                        time_advance_offset: ta,
                    }],
                });
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "NR cell scheduler simulator",
    long_about = "Drives the NR MAC cell scheduler slot by slot with synthetic UEs, \
                  traffic and HARQ/CSI/TA feedback from a TOML scenario file"
)]
struct Args {
    /// Scenario file (required)
    #[arg(help = "TOML scenario with cell parameters and simulated UEs")]
    config: String,
}

fn main() {
    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.debug_log.clone());

    let mut rng = rand::rng();
    let k1 = cfg.cell.harq.k1 as i32;
    let numerology = cfg.cell.numerology;

    let mut sched = MacScheduler::new(vec![cfg.shared_cell()], Arc::new(SimNotifier));

    // Admit all scenario UEs up front; they attach in fallback and confirm
    // their configuration a few slots in, like a real RRC setup would.
    let mut ues: Vec<SimUe> = Vec::with_capacity(cfg.ues.len());
    for (i, ue_cfg) in cfg.ues.iter().enumerate() {
        let ue = SimUe::new(i as u16, ue_cfg);
        sched.handle_ue_creation_request(UeCreationRequest {
            ue_index: ue.ue_index,
            crnti: ue.crnti,
            pcell: CellIndex(0),
            scells: vec![],
            lc_list: ue_cfg.lc_list.clone(),
            tag: TagId::new(0),
            drx: None,
            starts_in_fallback: true,
            con_res_id: Some(rng.random()),
        });
        // Pending RRC setup payload on SRB1
        sched.handle_dl_buffer_state_indication(DlBufferStateIndication {
            ue_index: ue.ue_index,
            lcid: LcId::SRB1,
            bytes: 120,
        });
        ues.push(ue);
    }

    // Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    let mut pending: VecDeque<Feedback> = VecDeque::new();
    let mut slot = SlotPoint::new(numerology, 0, 0);
    let mut slot_count: u64 = 0;
    let mut dl_granted: u64 = 0;
    let mut ul_granted: u64 = 0;

    tracing::info!("starting simulation: {} ues, numerology {}", ues.len(), numerology);

    while running.load(Ordering::SeqCst) && cfg.nof_slots.map_or(true, |n| slot_count < n) {
        deliver_due_feedback(&sched, &mut pending, slot);

        if slot_count == CONFIG_APPLIED_SLOT {
            for ue in &ues {
                sched.handle_config_applied(ue.ue_index);
            }
        }

        // Offered load arrives and is reported upwards
        for ue in &mut ues {
            if ue.dl_load_bytes > 0 {
                ue.dl_queue += ue.dl_load_bytes;
                sched.handle_dl_buffer_state_indication(DlBufferStateIndication {
                    ue_index: ue.ue_index,
                    lcid: ue.lcid,
                    bytes: ue.dl_queue,
                });
            }
            if ue.ul_load_bytes > 0 {
                ue.ul_queue += ue.ul_load_bytes;
                sched.handle_bsr_indication(BsrIndication {
                    ue_index: ue.ue_index,
                    crnti: ue.crnti,
                    cell_index: CellIndex(0),
                    format: BsrFormat::Short,
                    reports: vec![nr_msgs::feedback::BsrReport {
                        lcg: ue.lcg,
                        bytes: ue.ul_queue,
                    }],
                });
            }
            // Occasional CSI refresh
            if rng.random_bool(0.05) {
                sched.handle_uci_indication(UciIndication {
                    cell_index: CellIndex(0),
                    slot,
                    ucis: vec![UciPdu {
                        ue_index: ue.ue_index,
                        crnti: ue.crnti,
                        harqs: vec![],
                        sr_detected: false,
                        csi: Some(CsiReport {
                            cqi: rng.random_range(3..=15),
                            rank: 1,
                        }),
                    }],
                });
            }
        }

        let res = sched.slot_indication(CellIndex(0), slot);

        for grant in &res.dl {
            dl_granted += grant.tbs_bytes as u64;
            if let Some(ue) = ues.iter_mut().find(|u| u.ue_index == grant.ue_index) {
                let served: u32 = grant
                    .subpdus
                    .iter()
                    .filter_map(|p| match p {
                        SubPdu::Sdu { lcid, bytes } if *lcid == ue.lcid => Some(*bytes),
                        _ => None,
                    })
                    .sum();
                ue.dl_queue = ue.dl_queue.saturating_sub(served);
            }
            if grant.nof_retxs == 0 {
                pending.push_back(Feedback::DlAck {
                    due: grant.pdsch_slot.add_slots(k1),
                    ue_index: grant.ue_index,
                    crnti: grant.rnti,
                    harq_id: grant.harq_id,
                    ack: rng.random_bool(DECODE_PROB),
                });
            }
        }
        for grant in &res.ul {
            ul_granted += grant.tbs_bytes as u64;
            if let Some(ue) = ues.iter_mut().find(|u| u.ue_index == grant.ue_index) {
                ue.ul_queue = ue.ul_queue.saturating_sub(grant.tbs_bytes);
            }
            if grant.nof_retxs == 0 {
                let ta = rng.random_bool(0.2).then(|| rng.random_range(-4..8));
                pending.push_back(Feedback::UlCrc {
                    due: grant.pusch_slot.add_slots(1),
                    ue_index: grant.ue_index,
                    crnti: grant.rnti,
                    harq_id: grant.harq_id,
                    ok: rng.random_bool(DECODE_PROB),
                    ta,
                });
            }
        }
        // Sort by distance from the current slot so SFN wrap keeps ordering
        pending.make_contiguous().sort_by_key(|f| f.due().diff(slot));

        slot = slot.add_slots(1);
        slot_count += 1;
        if slot_count % 1000 == 0 {
            sched.flush_reclaimed();
            tracing::info!(
                slot = ?slot,
                "{} slots: {} dl bytes, {} ul bytes granted",
                slot_count,
                dl_granted,
                ul_granted
            );
        }
    }

    tracing::info!(
        "simulation done after {} slots: {} dl bytes, {} ul bytes granted",
        slot_count,
        dl_granted,
        ul_granted
    );

    // Tear the UEs down and let the deletions drain through one last slot
    for ue in &ues {
        sched.handle_ue_deletion_request(ue.ue_index);
    }
    sched.slot_indication(CellIndex(0), slot);
    sched.flush_reclaimed();
}
