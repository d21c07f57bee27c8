//! 实验结果.

use crate::profile::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.3}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Operations: {}", p.get_ops())?;
    writeln!(w, "{S4}Failed operations: {}", p.get_failed())?;
    writeln!(w, "{S4}Accumulated operation time: {} us", p.get_op_time_us())?;
    writeln!(
        w,
        "{S4}Average operation time: {} us",
        f64_to_display(p.get_avg_op_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros().to_string());
    write!(
        w,
        "{S4}Most time-consuming operation costs {} us",
        t.as_deref().unwrap_or("/")
    )?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
    objects: Vec<String>,
}

impl AblationResult {
    /// 由各组统计与最终保存的目标名构建.
    pub fn new<I: IntoIterator<Item = (&'static str, Profile)>>(it: I, objects: Vec<String>) -> Self {
        Self {
            data: it.into_iter().collect(),
            objects,
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for (key, profile) in self.data.iter() {
            if describe_into(key, profile, &mut buf).is_ok() {
                println!("{}", String::from_utf8_lossy(&buf));
            }
            buf.clear();

            utils::sep();
        }
        println!("Saved objects: {:?}", self.objects);
    }
}
