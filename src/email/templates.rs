use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::mailer::OutgoingEmail;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").unwrap();
}

pub type Vars<'a> = [(&'a str, String)];

/// Replaces `{{name}}` with its value; unknown names render empty.
pub fn render(template: &str, vars: &Vars<'_>, escape: bool) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let value = vars
                .iter()
                .find(|(k, _)| *k == &caps[1])
                .map(|(_, v)| v.as_str())
                .unwrap_or("");
            if escape {
                escape_html(value)
            } else {
                value.to_string()
            }
        })
        .into_owned()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub struct Template {
    pub subject: &'static str,
    pub text: &'static str,
    pub html: &'static str,
}

impl Template {
    pub fn render(&self, to: &str, vars: &Vars<'_>) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: render(self.subject, vars, false),
            text: render(self.text, vars, false),
            html: Some(render(self.html, vars, true)),
        }
    }
}

pub const DAILY_REMINDER: Template = Template {
    subject: "Daily Fitness Reminder - Don't Forget Your Goals!",
    text: "Good morning, {{name}}!

Your daily goals:
- Calories: {{calorie_goal}} kcal
- Protein: {{protein_goal}} g

Quick reminders:
- Log your meals throughout the day
- Stay hydrated
- Get some physical activity in
- Check your progress in the app

Small consistent actions lead to big results.

FitTrack
",
    html: r#"<html><body style="font-family:sans-serif">
<h2>Good morning, {{name}}!</h2>
<p>Your daily goals:</p>
<ul><li>Calories: <strong>{{calorie_goal}} kcal</strong></li><li>Protein: <strong>{{protein_goal}} g</strong></li></ul>
<p>Log your meals throughout the day, stay hydrated, get some physical activity in and check your progress in the app.</p>
<p>Small consistent actions lead to big results.</p>
<p style="color:#6B7280">FitTrack</p>
</body></html>"#,
};

pub const ACHIEVEMENT_UNLOCKED: Template = Template {
    subject: "Achievement Unlocked: {{achievement_name}}!",
    text: "Congratulations {{name}}!

You've earned the '{{achievement_name}}' achievement: {{achievement_description}}

Keep it up!

FitTrack
",
    html: r#"<html><body style="font-family:sans-serif">
<h2 style="color:{{badge_color}}">Achievement unlocked: {{achievement_name}}</h2>
<p>Congratulations {{name}}! {{achievement_description}}</p>
<p>Keep it up!</p>
<p style="color:#6B7280">FitTrack</p>
</body></html>"#,
};

pub const WELCOME: Template = Template {
    subject: "Welcome to FitTrack, {{name}}!",
    text: "Hi {{name}},

Your account is ready. Based on your profile we set these daily goals:
- Calories: {{calorie_goal}} kcal
- Protein: {{protein_goal}} g
- BMI: {{bmi}} ({{bmi_category}})

You can change them any time from your profile.

FitTrack
",
    html: r#"<html><body style="font-family:sans-serif">
<h2>Welcome, {{name}}!</h2>
<p>Your account is ready. Based on your profile we set these daily goals:</p>
<ul><li>Calories: <strong>{{calorie_goal}} kcal</strong></li><li>Protein: <strong>{{protein_goal}} g</strong></li><li>BMI: {{bmi}} ({{bmi_category}})</li></ul>
<p>You can change them any time from your profile.</p>
<p style="color:#6B7280">FitTrack</p>
</body></html>"#,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_and_blanks_unknown() {
        let vars = [("name", "Ann".to_string())];
        assert_eq!(render("Hi {{name}}, {{ name }}{{missing}}!", &vars, false), "Hi Ann, Ann!");
    }

    #[test]
    fn html_values_are_escaped() {
        let vars = [("name", "<b>Ann & co</b>".to_string())];
        assert_eq!(render("{{name}}", &vars, true), "&lt;b&gt;Ann &amp; co&lt;/b&gt;");
        assert_eq!(render("{{name}}", &vars, false), "<b>Ann & co</b>");
    }

    #[test]
    fn daily_reminder_mentions_goals() {
        let vars = [
            ("name", "Ann".to_string()),
            ("calorie_goal", "2200".to_string()),
            ("protein_goal", "96".to_string()),
        ];
        let email = DAILY_REMINDER.render("ann@example.com", &vars);
        assert_eq!(email.to, "ann@example.com");
        assert!(email.text.contains("Good morning, Ann!"));
        assert!(email.text.contains("Calories: 2200 kcal"));
        assert!(email.html.unwrap().contains("<strong>96 g</strong>"));
    }

    #[test]
    fn achievement_subject_names_the_badge() {
        let vars = [
            ("name", "Ann".to_string()),
            ("achievement_name", "3-Day Streak".to_string()),
            ("achievement_description", "Meet your goals for 3 consecutive days".to_string()),
        ];
        let email = ACHIEVEMENT_UNLOCKED.render("ann@example.com", &vars);
        assert_eq!(email.subject, "Achievement Unlocked: 3-Day Streak!");
        assert!(!email.text.contains("{{"));
    }
}
