//! Chip profile knowledge base.
//!
//! Documented glitch parameters collected from published research, CTF
//! writeups and bench notes. Campaigns seeded from a profile replay known
//! parameters first instead of opening with a blind sweep.

use crate::errors::ConfigError;
use crate::space::{AxisRange, ParameterPoint, SweepRange};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the attack is trying to defeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackTarget {
    RdpBypass,
    LockbitBypass,
    SecureBoot,
    AuthBypass,
    InstructionSkip,
    LoopEscape,
    General,
}

impl AttackTarget {
    /// Selector for config/CLI surfaces.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "rdp" | "rdp-bypass" => Ok(Self::RdpBypass),
            "lockbit" | "lockbit-bypass" => Ok(Self::LockbitBypass),
            "secure-boot" => Ok(Self::SecureBoot),
            "auth" | "auth-bypass" => Ok(Self::AuthBypass),
            "instruction-skip" => Ok(Self::InstructionSkip),
            "loop-escape" => Ok(Self::LoopEscape),
            "general" => Ok(Self::General),
            other => Err(ConfigError::UnknownTarget(other.to_string())),
        }
    }
}

/// One documented parameter set, with provenance in `notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownParams {
    pub point: ParameterPoint,
    /// Pulse repeat the source reported; the replay phase scales its
    /// per-point budget by it.
    pub repeat: u32,
    pub notes: String,
}

impl KnownParams {
    fn new(width_ns: u64, offset_ns: u64, notes: &str) -> Self {
        Self {
            point: ParameterPoint::new(width_ns, offset_ns),
            repeat: 1,
            notes: notes.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub chip_family: String,
    pub specific_chips: Vec<String>,
    pub target: AttackTarget,
    pub description: String,
    /// Documented parameters, most reliable first.
    pub known_params: Vec<KnownParams>,
    /// Search range for when the documented parameters do not reproduce.
    pub recommended_range: Option<SweepRange>,
    /// Response substrings that indicate success on this target.
    pub success_patterns: Vec<String>,
    pub trigger_event: String,
    pub source: String,
    pub tags: Vec<String>,
}

impl Profile {
    /// The range a campaign should sweep for this profile, falling back to
    /// the generic wide window when the profile carries none.
    pub fn sweep_range(&self) -> SweepRange {
        self.recommended_range.unwrap_or_else(generic_wide_range)
    }

    pub fn matches_keyword(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.name.to_lowercase().contains(&q)
            || self.chip_family.to_lowercase().contains(&q)
            || self.description.to_lowercase().contains(&q)
            || self.specific_chips.iter().any(|c| c.to_lowercase().contains(&q))
            || self.tags.iter().any(|t| t.to_lowercase().contains(&q))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// Wide search window for targets with no profile coverage.
pub fn generic_wide_range() -> SweepRange {
    SweepRange::new(AxisRange::new(50, 500, 50), AxisRange::new(1000, 10_000, 500))
}

/// Read access to a profile collection. `find_by_chip` returns matches in
/// decreasing specificity: an exact specific-chip match ranks above a
/// specific-chip prefix match, which ranks above a bare family match.
pub trait ProfileStore {
    fn all(&self) -> &[Profile];

    fn get(&self, name: &str) -> Option<&Profile> {
        self.all().iter().find(|p| p.name == name)
    }

    fn find_by_chip(&self, chip: &str) -> Vec<&Profile> {
        let chip_upper = chip.to_uppercase();
        let mut ranked: Vec<(&Profile, u8)> = Vec::new();
        for profile in self.all() {
            let specific: Vec<String> = profile
                .specific_chips
                .iter()
                .map(|c| c.to_uppercase())
                .collect();
            let rank = if specific.iter().any(|c| *c == chip_upper) {
                Some(2)
            } else if specific.iter().any(|c| chip_upper.starts_with(c.as_str())) {
                Some(1)
            } else {
                let family = profile.chip_family.to_uppercase().replace(' ', "");
                chip_upper.starts_with(&family).then_some(0)
            };
            if let Some(rank) = rank {
                ranked.push((profile, rank));
            }
        }
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().map(|(p, _)| p).collect()
    }

    fn search(&self, query: &str) -> Vec<&Profile> {
        self.all().iter().filter(|p| p.matches_keyword(query)).collect()
    }

    /// Resolve a campaign's profile: explicit name first, then the best
    /// chip match (optionally narrowed to one attack target), then the
    /// generic wide-search fallback.
    fn resolve(
        &self,
        name: Option<&str>,
        chip: Option<&str>,
        target: Option<AttackTarget>,
    ) -> Result<Profile, ConfigError> {
        if let Some(name) = name {
            return self
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()));
        }
        if let Some(chip) = chip {
            let best = self
                .find_by_chip(chip)
                .into_iter()
                .find(|p| target.map_or(true, |t| p.target == t));
            if let Some(profile) = best {
                return Ok(profile.clone());
            }
        }
        Ok(generic_profile())
    }
}

/// Built-in database, compiled in.
#[derive(Debug, Clone)]
pub struct BuiltinProfiles {
    profiles: Vec<Profile>,
}

impl Default for BuiltinProfiles {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinProfiles {
    pub fn new() -> Self {
        Self {
            profiles: builtin_profiles(),
        }
    }

    /// Append a user-supplied profile loaded from JSON.
    pub fn register(&mut self, profile: Profile) {
        self.profiles.retain(|p| p.name != profile.name);
        self.profiles.push(profile);
    }
}

impl ProfileStore for BuiltinProfiles {
    fn all(&self) -> &[Profile] {
        &self.profiles
    }
}

fn generic_profile() -> Profile {
    Profile {
        name: "GENERIC_ARM_CORTEX_M".into(),
        chip_family: "ARM Cortex-M".into(),
        specific_chips: vec![],
        target: AttackTarget::General,
        description: "Generic voltage glitching profile for ARM Cortex-M chips (wide search)"
            .into(),
        known_params: vec![],
        recommended_range: Some(generic_wide_range()),
        success_patterns: vec![
            ">>>".into(),
            "# ".into(),
            "$ ".into(),
            "shell>".into(),
            "bootloader>".into(),
            "target halted".into(),
        ],
        trigger_event: "Varies - try reset, UART TX, clock edges".into(),
        source: String::new(),
        tags: vec!["generic".into(), "arm-cortex-m".into(), "wide-search".into()],
    }
}

fn builtin_profiles() -> Vec<Profile> {
    let range = |wmin, wmax, wstep, omin, omax, ostep| {
        Some(SweepRange::new(
            AxisRange::new(wmin, wmax, wstep),
            AxisRange::new(omin, omax, ostep),
        ))
    };
    let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();

    vec![
        Profile {
            name: "STM32F1_RDP_BYPASS".into(),
            chip_family: "STM32F1".into(),
            specific_chips: strings(&[
                "STM32F103C8",
                "STM32F103RB",
                "STM32F103CB",
                "STM32F103VB",
            ]),
            target: AttackTarget::RdpBypass,
            description: "Bypass Read-out Protection (RDP) Level 1 on STM32F1 series during \
                          flash controller state transition"
                .into(),
            known_params: vec![
                KnownParams::new(120, 3500, "ECSC23 Challenge 2 - Board A"),
                KnownParams::new(85, 3200, "Dev board with minimal decoupling"),
                KnownParams::new(150, 3480, "Production board with heavy decoupling"),
            ],
            recommended_range: range(50, 200, 10, 1000, 5000, 100),
            success_patterns: strings(&[">>>", "target halted", "Flash unlocked"]),
            trigger_event: "Rising edge during RDP check (typically 2-5ms after reset)".into(),
            source: "ECSC23, Riscure blog, research papers".into(),
            tags: strings(&["stm32", "rdp", "voltage-glitch", "arm-cortex-m3"]),
        },
        Profile {
            name: "STM32F4_RDP_BYPASS".into(),
            chip_family: "STM32F4".into(),
            specific_chips: strings(&["STM32F407", "STM32F411", "STM32F429"]),
            target: AttackTarget::RdpBypass,
            description: "RDP Level 1 bypass on STM32F4 series - similar to F1 but requires a \
                          stronger glitch"
                .into(),
            known_params: vec![],
            recommended_range: range(80, 250, 15, 2000, 8000, 200),
            success_patterns: strings(&[">>>"]),
            trigger_event: "During RDP check, 3-8ms after reset".into(),
            source: String::new(),
            tags: strings(&["stm32", "rdp", "voltage-glitch", "arm-cortex-m4"]),
        },
        Profile {
            name: "ATMEGA328P_LOCKBIT_BYPASS".into(),
            chip_family: "AVR".into(),
            specific_chips: strings(&["ATmega328P", "ATmega328", "ATmega168"]),
            target: AttackTarget::LockbitBypass,
            description: "Bypass lockbit fuses on ATmega328P to dump protected flash".into(),
            known_params: vec![
                KnownParams::new(200, 1500, "Arduino Uno target"),
                KnownParams::new(180, 1450, "Standalone ATmega328P"),
            ],
            recommended_range: range(100, 300, 20, 500, 2000, 50),
            success_patterns: strings(&["Device signature", "reading flash"]),
            trigger_event: "During lockbit check in bootloader, ~1-2ms after reset".into(),
            source: "Colin O'Flynn (ChipWhisperer), various CTFs".into(),
            tags: strings(&["avr", "atmega", "lockbit", "voltage-glitch", "arduino"]),
        },
        Profile {
            name: "ESP32_SECURE_BOOT_BYPASS".into(),
            chip_family: "ESP32".into(),
            specific_chips: strings(&["ESP32-D0WDQ6", "ESP32-WROOM-32"]),
            target: AttackTarget::SecureBoot,
            description: "Bypass secure boot verification to load unsigned firmware".into(),
            known_params: vec![],
            recommended_range: range(80, 150, 10, 2000, 8000, 200),
            success_patterns: strings(&["Boot mode: (1)", "ets"]),
            trigger_event: "During secure boot signature check in BootROM".into(),
            source: "LimitedResults, DEF CON 27".into(),
            tags: strings(&["esp32", "secure-boot", "voltage-glitch", "iot"]),
        },
        Profile {
            name: "KINETIS_K_FLASH_PROTECTION".into(),
            chip_family: "Kinetis K".into(),
            specific_chips: strings(&["MK20DX256", "MK64FN1M0", "MK66FX1M0"]),
            target: AttackTarget::RdpBypass,
            description: "Bypass flash security on NXP Kinetis K-series (used in Teensy)".into(),
            known_params: vec![],
            recommended_range: range(50, 200, 15, 1000, 4000, 100),
            success_patterns: strings(&["OpenSDA", "target halted"]),
            trigger_event: "During flash security check".into(),
            source: String::new(),
            tags: strings(&["nxp", "kinetis", "arm-cortex-m4", "teensy"]),
        },
        Profile {
            name: "PIC18F_CODE_PROTECTION".into(),
            chip_family: "PIC18F".into(),
            specific_chips: strings(&["PIC18F4550", "PIC18F2550", "PIC18F4520"]),
            target: AttackTarget::LockbitBypass,
            description: "Bypass code protection on PIC18F series".into(),
            known_params: vec![],
            recommended_range: range(150, 400, 25, 500, 2500, 100),
            success_patterns: vec![],
            trigger_event: "During code protection check in bootloader".into(),
            source: String::new(),
            tags: strings(&["pic", "microchip", "code-protection"]),
        },
        generic_profile(),
        Profile {
            name: "GENERIC_AVR".into(),
            chip_family: "AVR".into(),
            specific_chips: vec![],
            target: AttackTarget::General,
            description: "Generic voltage glitching profile for AVR chips".into(),
            known_params: vec![],
            recommended_range: range(100, 400, 30, 500, 3000, 100),
            success_patterns: vec![],
            trigger_event: "Reset or clock edge".into(),
            source: String::new(),
            tags: strings(&["generic", "avr", "wide-search"]),
        },
    ]
}
